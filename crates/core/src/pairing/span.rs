//! Derived-product date spans and chain validation.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::granule::{scene_date_from_name, SCENE_NAME_LEN};

static PAIR_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(S1[AB]_IW_SLC.*?)(S1[AB]_IW_SLC.*)\.nc$").expect("valid pair filename pattern")
});

/// Splits a pair product filename into its primary and secondary scene names.
///
/// Each fragment is cut to the scene-name length, since whatever follows the
/// name belongs to the product, not the scene.
pub fn split_pair_filename(filename: &str) -> Option<(String, String)> {
    let caps = PAIR_FILENAME.captures(filename)?;
    let truncate = |s: &str| s.chars().take(SCENE_NAME_LEN).collect::<String>();
    Some((truncate(caps.get(1)?.as_str()), truncate(caps.get(2)?.as_str())))
}

/// The date span covered by one derived (pair) product.
#[derive(Debug, Clone)]
pub struct ProductSpan {
    pub primary_at: DateTime<Utc>,
    pub secondary_at: DateTime<Utc>,
    /// Where the product lives, if it came from disk.
    pub path: Option<PathBuf>,
}

impl ProductSpan {
    pub fn new(primary_at: DateTime<Utc>, secondary_at: DateTime<Utc>) -> Self {
        Self {
            primary_at,
            secondary_at,
            path: None,
        }
    }

    /// Span between two calendar dates, at midnight UTC.
    pub fn from_dates(primary: NaiveDate, secondary: NaiveDate) -> Self {
        Self::new(
            primary.and_time(chrono::NaiveTime::MIN).and_utc(),
            secondary.and_time(chrono::NaiveTime::MIN).and_utc(),
        )
    }

    /// Parses a pair product file path such as `S1A_IW_SLC_..._S1B_IW_SLC_....nc`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let filename = path.file_name()?.to_str()?;
        let (primary, secondary) = split_pair_filename(filename)?;
        Some(Self {
            primary_at: scene_date_from_name(&primary)?,
            secondary_at: scene_date_from_name(&secondary)?,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn primary_date(&self) -> NaiveDate {
        self.primary_at.date_naive()
    }

    pub fn secondary_date(&self) -> NaiveDate {
        self.secondary_at.date_naive()
    }
}

impl PartialEq for ProductSpan {
    fn eq(&self, other: &Self) -> bool {
        self.primary_at == other.primary_at && self.secondary_at == other.secondary_at
    }
}

impl std::fmt::Display for ProductSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S1AR_{}-{}", self.primary_date(), self.secondary_date())
    }
}

/// True if one span ends on the day the other begins.
pub fn connected(a: &ProductSpan, b: &ProductSpan) -> bool {
    a.secondary_date() == b.primary_date() || b.secondary_date() == a.primary_date()
}

/// Distance in days between two spans.
///
/// Negative means the spans overlap, zero means they are exactly bookended,
/// positive is the size of the hole between them.
pub fn overlap_days(a: &ProductSpan, b: &ProductSpan) -> f64 {
    let later_start = a.primary_date().max(b.primary_date());
    let earlier_end = a.secondary_date().min(b.secondary_date());
    (later_start - earlier_end).num_seconds() as f64 / 86_400.0
}

/// True if every adjacent pair in the (sorted) sequence is connected.
pub fn is_fully_connected(sorted: &[ProductSpan]) -> bool {
    sorted.windows(2).all(|w| connected(&w[0], &w[1]))
}

/// A break in a product chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Gap {
    pub earlier: ProductSpan,
    pub later: ProductSpan,
    pub overlap_days: f64,
}

impl std::fmt::Display for Gap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to {} is not connected (separation: {} days)",
            self.earlier, self.later, self.overlap_days
        )
    }
}

/// Every adjacent pair in the (sorted) sequence that is not connected.
pub fn find_gaps(sorted: &[ProductSpan]) -> Vec<Gap> {
    sorted
        .windows(2)
        .filter(|w| !connected(&w[0], &w[1]))
        .map(|w| Gap {
            earlier: w[0].clone(),
            later: w[1].clone(),
            overlap_days: overlap_days(&w[0], &w[1]),
        })
        .collect()
}

/// Sorted, deduplicated view over a set of products, with its gaps.
#[derive(Debug, Clone)]
pub struct ConnectivityReport {
    pub spans: Vec<ProductSpan>,
    pub gaps: Vec<Gap>,
}

impl ConnectivityReport {
    pub fn new(spans: Vec<ProductSpan>) -> Self {
        let mut sorted: Vec<ProductSpan> = Vec::with_capacity(spans.len());
        for span in spans {
            if !sorted.contains(&span) {
                sorted.push(span);
            }
        }
        sorted.sort_by_key(|s| s.primary_date());

        let gaps = find_gaps(&sorted);
        Self {
            spans: sorted,
            gaps,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.gaps.is_empty()
    }

    /// Logs the sorted products and any gaps.
    pub fn log(&self) {
        for span in &self.spans {
            tracing::info!("product: {}", span);
        }
        if self.is_connected() {
            tracing::info!("{} products are connected", self.spans.len());
        } else {
            tracing::warn!(
                "{} products are not connected ({} gaps)",
                self.spans.len(),
                self.gaps.len()
            );
            for gap in &self.gaps {
                tracing::warn!("{}", gap);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(p: (i32, u32, u32), s: (i32, u32, u32)) -> ProductSpan {
        ProductSpan::from_dates(
            NaiveDate::from_ymd_opt(p.0, p.1, p.2).unwrap(),
            NaiveDate::from_ymd_opt(s.0, s.1, s.2).unwrap(),
        )
    }

    const PRIMARY: &str = "S1A_IW_SLC__1SSH_20200101T120000_20200101T120027_030000_036F1A_ABCD";
    const SECONDARY: &str = "S1B_IW_SLC__1SSH_20200113T120000_20200113T120027_020000_025E1B_EF01";

    #[test]
    fn test_connected_either_direction() {
        let a = span((2020, 1, 1), (2020, 1, 13));
        let b = span((2020, 1, 13), (2020, 1, 25));
        assert!(connected(&a, &b));
        assert!(connected(&b, &a));
        assert!(!connected(&a, &span((2020, 1, 14), (2020, 1, 26))));
    }

    #[test]
    fn test_overlap_days_signs() {
        let a = span((2020, 1, 1), (2020, 1, 13));
        assert_eq!(overlap_days(&a, &span((2020, 1, 13), (2020, 1, 25))), 0.0);
        assert_eq!(overlap_days(&a, &span((2020, 1, 5), (2020, 1, 20))), -8.0);
        assert_eq!(overlap_days(&a, &span((2020, 1, 20), (2020, 2, 1))), 7.0);
    }

    #[test]
    fn test_short_sequences_are_connected() {
        assert!(is_fully_connected(&[]));
        assert!(is_fully_connected(&[span((2020, 1, 1), (2020, 1, 13))]));
    }

    #[test]
    fn test_single_gap_detected() {
        let spans = vec![
            span((2020, 1, 1), (2020, 1, 13)),
            span((2020, 1, 13), (2020, 1, 25)),
            span((2020, 2, 1), (2020, 2, 13)),
        ];
        assert!(!is_fully_connected(&spans));

        let gaps = find_gaps(&spans);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].earlier, spans[1]);
        assert_eq!(gaps[0].later, spans[2]);
        assert_eq!(gaps[0].overlap_days, 7.0);
    }

    #[test]
    fn test_split_pair_filename() {
        let filename = format!("{}{}.nc", PRIMARY, SECONDARY);
        let (p, s) = split_pair_filename(&filename).unwrap();
        assert_eq!(p, PRIMARY);
        assert_eq!(s, SECONDARY);
    }

    #[test]
    fn test_split_pair_filename_truncates_product_suffix() {
        let filename = format!("{}_{}_G0120V02_P099.nc", PRIMARY, SECONDARY);
        let (p, s) = split_pair_filename(&filename).unwrap();
        assert_eq!(p, PRIMARY);
        assert_eq!(s, SECONDARY);
    }

    #[test]
    fn test_split_pair_filename_rejects_other_files() {
        assert!(split_pair_filename("notes.txt").is_none());
        assert!(split_pair_filename(&format!("{}.nc", PRIMARY)).is_none());
        assert!(split_pair_filename(&format!("{}{}.tif", PRIMARY, SECONDARY)).is_none());
    }

    #[test]
    fn test_span_from_path() {
        let path = PathBuf::from(format!("/products/{}{}.nc", PRIMARY, SECONDARY));
        let span = ProductSpan::from_path(&path).unwrap();
        assert_eq!(span.primary_date(), NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(span.secondary_date(), NaiveDate::from_ymd_opt(2020, 1, 13).unwrap());
        assert_eq!(span.to_string(), "S1AR_2020-01-01-2020-01-13");
        assert_eq!(span.path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_report_sorts_and_dedupes() {
        let report = ConnectivityReport::new(vec![
            span((2020, 1, 13), (2020, 1, 25)),
            span((2020, 1, 1), (2020, 1, 13)),
            span((2020, 1, 13), (2020, 1, 25)),
        ]);
        assert_eq!(report.spans.len(), 2);
        assert_eq!(report.spans[0].to_string(), "S1AR_2020-01-01-2020-01-13");
        assert!(report.is_connected());
    }
}
