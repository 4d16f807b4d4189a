//! Local evidence scanning.
//!
//! Finds finished products on local storage and maps them back to catalog
//! scenes. Anything that cannot be mapped is skipped; a stray file in the
//! output directory is never an error.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::{debug, warn};

use crate::granule::{Granule, GranulePair, UnitStatus};
use crate::pairing::{split_pair_filename, ProductSpan};

static SCENE_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^S1.*_[a-zA-Z0-9]{4}.+$").expect("valid scene entry pattern"));

static LOG_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"SAFE directory[ ]*: (S1\S*\.SAFE)").expect("valid log marker pattern")
});

/// Lists file names in `dir`. A missing directory has no entries.
fn list_entries(dir: &Path) -> Vec<String> {
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Scan directory {:?} does not exist yet", dir);
            return Vec::new();
        }
        Err(e) => {
            warn!("Failed to list {:?}: {}", dir, e);
            return Vec::new();
        }
    };

    let mut names: Vec<String> = read_dir
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    names
}

/// Path of the processing log for a product directory: `<dir>/<entry>/<entry>.log`.
pub fn processing_log_path(dir: &Path, entry: &str) -> PathBuf {
    dir.join(entry).join(format!("{}.log", entry))
}

/// Recovers the original catalog scene name from a product's processing log.
///
/// Returns `None` if the log is missing, unreadable, or has no marker line.
pub fn resolve_original_name(dir: &Path, entry: &str) -> Option<String> {
    let path = processing_log_path(dir, entry);
    let file = match File::open(&path) {
        Ok(f) => f,
        Err(e) => {
            debug!("No readable processing log for {}: {}", entry, e);
            return None;
        }
    };

    BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .find_map(|line| {
            LOG_MARKER
                .captures(&line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
}

/// Finds single-scene products in `dir` and returns their scenes as `Localized`.
pub fn scan_single_products(dir: &Path) -> Vec<Granule> {
    let mut found: Vec<Granule> = Vec::new();

    for entry in list_entries(dir) {
        if !SCENE_ENTRY.is_match(&entry) || entry.ends_with(".zip") {
            continue;
        }
        let Some(name) = resolve_original_name(dir, &entry) else {
            continue;
        };
        let Some(granule) = Granule::from_name(&name) else {
            warn!("Processing log for {} names an undated scene: {}", entry, name);
            continue;
        };
        let granule = granule.with_status(UnitStatus::Localized);
        if !found.contains(&granule) {
            debug!("Found local product {} for scene {}", entry, granule.name);
            found.push(granule);
        }
    }

    found
}

/// Finds a known scene matching a filename fragment by substring containment.
fn resolve_fragment<'a>(fragment: &str, known: &'a [Granule]) -> Option<&'a Granule> {
    known
        .iter()
        .find(|g| g.name.contains(fragment) || fragment.contains(g.name.as_str()))
}

/// Finds pair products in `dir` whose two scenes are both in `known`.
///
/// Returned pairs are `Localized`. Files naming an unknown scene are skipped.
pub fn scan_paired_products(dir: &Path, known: &[Granule]) -> Vec<GranulePair> {
    let mut found: Vec<GranulePair> = Vec::new();

    for entry in list_entries(dir) {
        let Some((primary, secondary)) = split_pair_filename(&entry) else {
            continue;
        };
        let (Some(p), Some(s)) = (
            resolve_fragment(&primary, known),
            resolve_fragment(&secondary, known),
        ) else {
            debug!("Skipping pair product {}: scenes not in catalog", entry);
            continue;
        };
        let pair = GranulePair::new(p.clone(), s.clone()).with_status(UnitStatus::Localized);
        if !found.contains(&pair) {
            debug!("Found local pair product {}", entry);
            found.push(pair);
        }
    }

    found
}

/// Parses every pair product in `dir` into its date span.
pub fn scan_pair_spans(dir: &Path) -> Vec<ProductSpan> {
    list_entries(dir)
        .into_iter()
        .filter_map(|entry| ProductSpan::from_path(&dir.join(entry)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use tempfile::TempDir;

    const SCENE: &str = "S1A_IW_SLC__1SSH_20200101T120000_20200101T120027_030000_036F1A_ABCD";
    const OTHER: &str = "S1B_IW_SLC__1SSH_20200113T120000_20200113T120027_020000_025E1B_EF01";

    fn write_product(dir: &Path, entry: &str, log: &str) {
        let product = dir.join(entry);
        fs::create_dir_all(&product).unwrap();
        fs::write(product.join(format!("{}.log", entry)), log).unwrap();
    }

    #[test]
    fn test_resolves_name_from_log() {
        let dir = TempDir::new().unwrap();
        let entry = "S1A_IW_20200101T120000_DVP_RTC30_G_gpuned_5A3B";
        write_product(
            dir.path(),
            entry,
            &format!(
                "starting rtc\nSAFE directory  : {}.SAFE\nfinished\n",
                SCENE
            ),
        );

        let found = scan_single_products(dir.path());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, SCENE);
        assert_eq!(found[0].id, "ABCD");
        assert_eq!(found[0].status, UnitStatus::Localized);
    }

    #[test]
    fn test_missing_log_or_marker_skipped() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("S1A_IW_20200101T120000_DVP_RTC30_G_gpuned_1111")).unwrap();
        write_product(
            dir.path(),
            "S1A_IW_20200113T120000_DVP_RTC30_G_gpuned_2222",
            "no marker in here\n",
        );

        assert!(scan_single_products(dir.path()).is_empty());
    }

    #[test]
    fn test_zip_and_foreign_entries_ignored() {
        let dir = TempDir::new().unwrap();
        let entry = "S1A_IW_20200101T120000_DVP_RTC30_G_gpuned_5A3B.zip";
        fs::write(dir.path().join(entry), b"PK").unwrap();
        write_product(dir.path(), "notes", &format!("SAFE directory: {}.SAFE", SCENE));

        assert!(scan_single_products(dir.path()).is_empty());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        assert!(scan_single_products(Path::new("/nonexistent/products")).is_empty());
        assert!(scan_paired_products(Path::new("/nonexistent/products"), &[]).is_empty());
    }

    #[test]
    fn test_pair_resolved_only_when_both_known() {
        let dir = TempDir::new().unwrap();
        let known = vec![
            Granule::from_name(SCENE).unwrap(),
            Granule::from_name(OTHER).unwrap(),
        ];
        fs::write(dir.path().join(format!("{}{}.nc", SCENE, OTHER)), b"").unwrap();
        fs::write(
            dir.path().join(format!(
                "{}S1B_IW_SLC__1SSH_20200125T120000_20200125T120027_020000_025E1B_9999.nc",
                OTHER
            )),
            b"",
        )
        .unwrap();

        let pairs = scan_paired_products(dir.path(), &known);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].primary.id, "ABCD");
        assert_eq!(pairs[0].secondary.id, "EF01");
        assert_eq!(pairs[0].status, UnitStatus::Localized);
    }

    #[test]
    fn test_pair_spans_listed() {
        let dir = TempDir::new().unwrap();
        let series = fixtures::granule_series(3);
        for w in series.windows(2) {
            fs::write(
                dir.path().join(fixtures::pair_product_filename(&w[0], &w[1])),
                b"",
            )
            .unwrap();
        }
        fs::write(dir.path().join("README.txt"), b"").unwrap();

        let spans = scan_pair_spans(dir.path());
        assert_eq!(spans.len(), 2);
        assert!(spans.iter().all(|s| s.path.is_some()));
    }
}
