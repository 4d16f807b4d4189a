//! Catalog search parameters.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::CatalogError;
use crate::config::CatalogConfig;

/// Timestamp format the catalog expects for `start` and `end`.
pub const CATALOG_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parameters for one catalog search.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub platform: String,
    pub polarization: String,
    pub processing_level: String,
    /// Spatial filter, `polygon((lon lat,...))`.
    pub intersects_with: String,
    pub relative_orbit: Option<u32>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl CatalogQuery {
    /// Sentinel-1 HH SLC scenes intersecting the given polygon.
    pub fn new(intersects_with: impl Into<String>) -> Self {
        Self {
            platform: "S1".to_string(),
            polarization: "HH".to_string(),
            processing_level: "SLC".to_string(),
            intersects_with: intersects_with.into(),
            relative_orbit: None,
            start: None,
            end: None,
        }
    }

    /// Builds the query a tracker runs at startup.
    pub fn from_config(
        config: &CatalogConfig,
        intersects_with: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        let start = config.start.as_deref().map(normalize_date).transpose()?;
        let end = config.end.as_deref().map(normalize_date).transpose()?;
        Ok(Self {
            platform: config.platform.clone(),
            polarization: config.polarization.clone(),
            processing_level: config.processing_level.clone(),
            intersects_with: intersects_with.into(),
            relative_orbit: config.relative_orbit,
            start,
            end,
        })
    }

    pub fn with_relative_orbit(mut self, orbit: u32) -> Self {
        self.relative_orbit = Some(orbit);
        self
    }

    pub fn with_date_range(
        mut self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Query-string parameters, in the order the catalog documents them.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("platform", self.platform.clone()),
            ("polarization", self.polarization.clone()),
            ("processingLevel", self.processing_level.clone()),
            ("intersectsWith", self.intersects_with.clone()),
        ];
        if let Some(orbit) = self.relative_orbit {
            params.push(("relativeOrbit", orbit.to_string()));
        }
        if let Some(start) = self.start {
            params.push(("start", start.format(CATALOG_DATE_FORMAT).to_string()));
        }
        if let Some(end) = self.end {
            params.push(("end", end.format(CATALOG_DATE_FORMAT).to_string()));
        }
        params.push(("output", "json".to_string()));
        params
    }
}

/// Parses a user-supplied date or datetime.
///
/// Accepts RFC 3339 (converted to UTC), a naive `YYYY-MM-DDTHH:MM:SS` or
/// `YYYY-MM-DD HH:MM:SS`, or a plain `YYYY-MM-DD` (midnight).
pub fn normalize_date(input: &str) -> Result<NaiveDateTime, CatalogError> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
        .map_err(|_| CatalogError::InvalidDate(input.to_string()))
}
