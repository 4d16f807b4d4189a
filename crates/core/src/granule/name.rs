//! Scene name parsing helpers.

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Length of a full Sentinel-1 scene name without the `.SAFE` suffix.
pub const SCENE_NAME_LEN: usize = 67;

static NAME_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^S1.*?(\d{8}T\d{6})").expect("valid scene date pattern"));

/// Removes a trailing `.SAFE` directory suffix, if present.
pub fn strip_safe_suffix(name: &str) -> &str {
    name.strip_suffix(".SAFE").unwrap_or(name)
}

/// Returns the 4-character short code at the end of a scene name.
///
/// The code is not unique across orbits or years; it is the identity key
/// every tracker comparison relies on.
pub fn short_id(name: &str) -> String {
    let name = strip_safe_suffix(name);
    let count = name.chars().count();
    name.chars().skip(count.saturating_sub(4)).collect()
}

/// Parses the first `YYYYMMDDTHHMMSS` block of a scene name as a UTC timestamp.
pub fn scene_date_from_name(name: &str) -> Option<DateTime<Utc>> {
    let caps = NAME_DATE.captures(name)?;
    let naive = NaiveDateTime::parse_from_str(caps.get(1)?.as_str(), "%Y%m%dT%H%M%S").ok()?;
    Some(naive.and_utc())
}
