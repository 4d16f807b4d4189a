//! Area-of-interest boundary loading.
//!
//! Boundaries come from GeoJSON, whose coordinates are WGS84 longitude and
//! latitude by definition (RFC 7946), which is what the catalog expects.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while loading a boundary.
#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("Boundary file not found: {0}")]
    NotFound(String),

    #[error("Failed to read boundary file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid GeoJSON: {0}")]
    InvalidGeoJson(String),

    #[error("No polygon geometry found in boundary")]
    NoPolygon,

    #[error("Polygon ring needs at least 3 distinct points, got {0}")]
    DegenerateRing(usize),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Document {
    FeatureCollection { features: Vec<Feature> },
    Feature { geometry: Option<Geometry> },
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Vec<f64>>>>,
    },
    #[serde(other)]
    Other,
}

impl Geometry {
    fn exterior_ring(self) -> Option<Vec<Vec<f64>>> {
        match self {
            Geometry::Polygon { coordinates } => coordinates.into_iter().next(),
            Geometry::MultiPolygon { coordinates } => {
                coordinates.into_iter().next()?.into_iter().next()
            }
            Geometry::Other => None,
        }
    }
}

/// Exterior ring of the area of interest, as closed (lon, lat) points.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    exterior: Vec<(f64, f64)>,
}

impl Boundary {
    /// Build a boundary from ring points, closing the ring if needed.
    pub fn from_ring(points: Vec<(f64, f64)>) -> Result<Self, BoundaryError> {
        let mut exterior = points;
        if exterior.first() != exterior.last() {
            if let Some(&first) = exterior.first() {
                exterior.push(first);
            }
        }
        // A closed ring repeats its first point, so 3 distinct points need 4 entries.
        if exterior.len() < 4 {
            return Err(BoundaryError::DegenerateRing(
                exterior.len().saturating_sub(1),
            ));
        }
        Ok(Self { exterior })
    }

    /// Parse the first polygon of a GeoJSON document.
    pub fn from_geojson_str(json: &str) -> Result<Self, BoundaryError> {
        let document: Document =
            serde_json::from_str(json).map_err(|e| BoundaryError::InvalidGeoJson(e.to_string()))?;

        let ring = match document {
            Document::FeatureCollection { features } => features
                .into_iter()
                .filter_map(|f| f.geometry)
                .find_map(Geometry::exterior_ring),
            Document::Feature { geometry } => geometry.and_then(Geometry::exterior_ring),
            Document::Polygon { coordinates } => Geometry::Polygon { coordinates }.exterior_ring(),
            Document::MultiPolygon { coordinates } => {
                Geometry::MultiPolygon { coordinates }.exterior_ring()
            }
        }
        .ok_or(BoundaryError::NoPolygon)?;

        let points = ring
            .into_iter()
            .map(|position| match position.as_slice() {
                [lon, lat, ..] => Ok((*lon, *lat)),
                _ => Err(BoundaryError::InvalidGeoJson(
                    "position needs at least two coordinates".to_string(),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_ring(points)
    }

    /// Load the first polygon of a GeoJSON file.
    pub fn from_geojson_file(path: &Path) -> Result<Self, BoundaryError> {
        if !path.exists() {
            return Err(BoundaryError::NotFound(path.display().to_string()));
        }
        let json = std::fs::read_to_string(path)?;
        Self::from_geojson_str(&json)
    }

    /// Closed exterior ring, first point repeated last.
    pub fn exterior(&self) -> &[(f64, f64)] {
        &self.exterior
    }

    /// Catalog spatial filter: `polygon((lon lat,lon lat,...))`.
    pub fn to_catalog_polygon(&self) -> String {
        let points: Vec<String> = self
            .exterior
            .iter()
            .map(|(lon, lat)| format!("{} {}", lon, lat))
            .collect();
        format!("polygon(({}))", points.join(","))
    }
}
