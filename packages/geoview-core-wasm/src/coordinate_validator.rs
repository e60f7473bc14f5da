//! WGS84 sanity checks run once when a layer is loaded.
//!
//! Nothing in here is an error: results are findings the caller shows to the
//! user before deciding whether to keep the layer.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::FeatureCollection;

/// Only the first few violations get a message of their own.
pub const MAX_COORDINATE_ERRORS: usize = 5;

const DEFAULT_CRS_NAME: &str = "WGS 84";
const DEFAULT_EPSG_CODE: &str = "EPSG:4326";

lazy_static! {
    static ref EPSG_PATTERN: Regex = Regex::new(r"(?i)EPSG[:/](\d+)").expect("valid EPSG pattern");
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinateValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub out_of_bounds_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionReport {
    pub likely_issue: bool,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrsInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epsg_code: Option<String>,
    #[serde(rename = "isWGS84")]
    pub is_wgs84: bool,
    pub is_valid: bool,
    pub warnings: Vec<String>,
}

impl Default for CrsInfo {
    fn default() -> Self {
        Self {
            name: DEFAULT_CRS_NAME.to_string(),
            epsg_code: Some(DEFAULT_EPSG_CODE.to_string()),
            is_wgs84: true,
            is_valid: true,
            warnings: Vec::new(),
        }
    }
}

/// Check every coordinate against `[-180, 180]` × `[-90, 90]`.
///
/// Longitude and latitude violations on the same coordinate are counted
/// separately. Malformed positions (fewer than two ordinates) are skipped.
pub fn validate_coordinates(collection: &FeatureCollection) -> CoordinateValidation {
    let mut errors = Vec::new();
    let mut out_of_bounds_count = 0usize;

    for (index, feature) in collection.iter().enumerate() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };

        geometry.for_each_position(&mut |position| {
            let [lng, lat, ..] = position.as_slice() else {
                return;
            };

            if *lng < -180.0 || *lng > 180.0 {
                out_of_bounds_count += 1;
                if errors.len() < MAX_COORDINATE_ERRORS {
                    errors.push(format!(
                        "Feature {}: Longitude {} is out of valid range [-180, 180]",
                        index, lng
                    ));
                }
            }

            if *lat < -90.0 || *lat > 90.0 {
                out_of_bounds_count += 1;
                if errors.len() < MAX_COORDINATE_ERRORS {
                    errors.push(format!(
                        "Feature {}: Latitude {} is out of valid range [-90, 90]",
                        index, lat
                    ));
                }
            }
        });
    }

    if out_of_bounds_count > MAX_COORDINATE_ERRORS {
        errors.push(format!(
            "... and {} more coordinate errors",
            out_of_bounds_count - MAX_COORDINATE_ERRORS
        ));
    }

    CoordinateValidation {
        valid: out_of_bounds_count == 0,
        errors,
        out_of_bounds_count,
    }
}

/// Heuristic look for projected data, near-origin clusters and swapped axes.
pub fn detect_projection_issues(collection: &FeatureCollection) -> ProjectionReport {
    let mut coords: Vec<(f64, f64)> = Vec::new();
    for geometry in collection.iter().filter_map(|f| f.geometry.as_ref()) {
        geometry.for_each_position(&mut |position| {
            if let [lng, lat, ..] = position.as_slice() {
                coords.push((*lng, *lat));
            }
        });
    }

    let mut report = ProjectionReport {
        likely_issue: false,
        suggestions: Vec::new(),
    };
    if coords.is_empty() {
        return report;
    }

    let all_large = coords
        .iter()
        .all(|(lng, lat)| lng.abs() > 180.0 || lat.abs() > 90.0);
    if all_large {
        report.likely_issue = true;
        report.suggestions.extend([
            "Coordinates appear to be in a projected coordinate system (e.g., UTM, Web Mercator).".to_string(),
            "GeoJSON requires WGS84 (EPSG:4326) coordinates in decimal degrees.".to_string(),
            "Please reproject your data to WGS84 before loading.".to_string(),
        ]);
        return report;
    }

    let all_small = coords
        .iter()
        .all(|(lng, lat)| lng.abs() < 1.0 && lat.abs() < 1.0);
    if all_small {
        report.suggestions.push(
            "Coordinates are very close to [0, 0]. This might indicate an issue with the data.".to_string(),
        );
    }

    let possibly_swapped = coords
        .iter()
        .any(|(lng, lat)| lat.abs() > 90.0 && lng.abs() <= 90.0);
    if possibly_swapped {
        report.likely_issue = true;
        report.suggestions.extend([
            "Some coordinates have latitude values > 90° but longitude values within range.".to_string(),
            "Your latitude and longitude values might be swapped.".to_string(),
            "GeoJSON coordinates should be in [longitude, latitude] order.".to_string(),
        ]);
    }

    report
}

/// Read the legacy `crs` member, if any. RFC 7946 documents are WGS84.
pub fn detect_crs(raw: &Value) -> CrsInfo {
    let mut info = CrsInfo::default();
    let Some(crs) = raw.get("crs").filter(|crs| !crs.is_null()) else {
        return info;
    };

    info.warnings.push(
        "CRS object detected. Note: RFC 7946 removes CRS support. GeoJSON should use WGS84 (EPSG:4326)."
            .to_string(),
    );

    let name = crs
        .get("properties")
        .and_then(|properties| properties.get("name"))
        .or_else(|| crs.get("name"))
        .and_then(Value::as_str);

    if let Some(name) = name {
        info.name = name.to_string();
        info.is_wgs84 = name.contains("4326") || name.contains("WGS84");
        info.epsg_code = EPSG_PATTERN
            .captures(name)
            .map(|captures| format!("EPSG:{}", &captures[1]));

        if !info.is_wgs84 {
            info.warnings.push(format!(
                "Non-WGS84 CRS detected: {}. This may cause display issues as the map expects WGS84 coordinates.",
                name
            ));
            info.is_valid = false;
        }
    }

    info
}

pub fn format_crs_display(info: &CrsInfo) -> String {
    match &info.epsg_code {
        Some(code) => format!("{} ({})", info.name, code),
        None => info.name.clone(),
    }
}

pub fn wgs84_description() -> &'static str {
    "World Geodetic System 1984 - Standard for GeoJSON (RFC 7946). Coordinates in decimal degrees."
}
