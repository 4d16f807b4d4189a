//! Catalog response parsing.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::CatalogError;
use crate::granule::{scene_date_from_name, Granule};

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "granuleName")]
    granule_name: Option<String>,
    #[serde(rename = "sceneDate")]
    scene_date: Option<String>,
}

fn parse_scene_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc())
}

/// Parses a catalog JSON response into granules.
///
/// The response is an array whose first element is the result batch. Each
/// entry must carry a `granuleName`; its date comes from `sceneDate` or,
/// failing that, from the name. Duplicate ids keep their first occurrence.
pub fn parse_catalog_response(body: &str) -> Result<Vec<Granule>, CatalogError> {
    let batches: Vec<Value> = serde_json::from_str(body)
        .map_err(|e| CatalogError::ParseError(format!("response is not a JSON array: {}", e)))?;
    let first = batches
        .into_iter()
        .next()
        .ok_or_else(|| CatalogError::ParseError("response contains no result batch".into()))?;
    let entries: Vec<CatalogEntry> = serde_json::from_value(first)
        .map_err(|e| CatalogError::ParseError(format!("malformed result batch: {}", e)))?;

    let mut seen = HashSet::new();
    let mut granules = Vec::with_capacity(entries.len());

    for (idx, entry) in entries.into_iter().enumerate() {
        let name = entry
            .granule_name
            .ok_or_else(|| CatalogError::ParseError(format!("result {} has no granuleName", idx)))?;

        let scene_date = entry
            .scene_date
            .as_deref()
            .and_then(parse_scene_date)
            .or_else(|| scene_date_from_name(&name))
            .ok_or_else(|| {
                CatalogError::ParseError(format!("result {} ({}) has no usable date", idx, name))
            })?;

        let granule = Granule::new(&name, scene_date);
        if seen.insert(granule.id.clone()) {
            granules.push(granule);
        }
    }

    Ok(granules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_first_batch() {
        let body = r#"[[
            {"granuleName": "S1A_IW_SLC__1SSH_20200101T120000_20200101T120027_030000_036F1A_ABCD", "sceneDate": "2020-01-01T12:00:00.000000"},
            {"granuleName": "S1B_IW_SLC__1SSH_20200113T120000_20200113T120027_020000_025E1B_EF01", "sceneDate": "2020-01-13T12:00:00Z"}
        ], [{"ignored": true}]]"#;

        let granules = parse_catalog_response(body).unwrap();
        assert_eq!(granules.len(), 2);
        assert_eq!(granules[0].id, "ABCD");
        assert_eq!(
            granules[0].scene_date,
            Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(granules[1].id, "EF01");
    }

    #[test]
    fn test_date_falls_back_to_name() {
        let body = r#"[[{"granuleName": "S1A_IW_SLC__1SSH_20200105T010203_X_ABCD"}]]"#;
        let granules = parse_catalog_response(body).unwrap();
        assert_eq!(
            granules[0].scene_date,
            Utc.with_ymd_and_hms(2020, 1, 5, 1, 2, 3).unwrap()
        );
    }

    #[test]
    fn test_duplicates_by_id_removed() {
        let body = r#"[[
            {"granuleName": "S1A_IW_SLC__1SSH_20200101T120000_X_ABCD"},
            {"granuleName": "S1A_IW_SLC__1SSH_20200101T120000_X_ABCD"},
            {"granuleName": "S1B_IW_SLC__1SSH_20210101T120000_Y_ABCD"}
        ]]"#;
        let granules = parse_catalog_response(body).unwrap();
        assert_eq!(granules.len(), 1);
        assert!(granules[0].name.starts_with("S1A"));
    }

    #[test]
    fn test_empty_batch_is_ok() {
        assert!(parse_catalog_response("[[]]").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_responses_fail() {
        for body in [
            "",
            "{\"error\": \"bad polygon\"}",
            "[]",
            "[[{\"sceneDate\": \"2020-01-01T00:00:00\"}]]",
            "[[{\"granuleName\": \"no-date\"}]]",
        ] {
            assert!(
                matches!(
                    parse_catalog_response(body),
                    Err(CatalogError::ParseError(_))
                ),
                "expected parse error for {:?}",
                body
            );
        }
    }
}
