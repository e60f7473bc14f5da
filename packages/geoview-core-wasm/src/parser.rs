//! GeoJSON text ingestion and structural validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::models::{Feature, FeatureCollection, Geometry, Properties};

const GEOMETRY_TYPES: [&str; 7] = [
    "Point",
    "LineString",
    "Polygon",
    "MultiPoint",
    "MultiLineString",
    "MultiPolygon",
    "GeometryCollection",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureValidation {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl StructureValidation {
    fn error(&mut self, message: impl Into<String>, path: &str, code: &str) {
        self.errors.push(ValidationError {
            message: message.into(),
            path: (!path.is_empty()).then(|| path.to_string()),
            code: code.to_string(),
        });
    }

    fn warning(&mut self, message: impl Into<String>, path: &str) {
        self.warnings.push(ValidationWarning {
            message: message.into(),
            path: (!path.is_empty()).then(|| path.to_string()),
        });
    }
}

/// Parse GeoJSON text into a raw JSON value.
pub fn parse_value(text: &str) -> Result<Value> {
    Ok(serde_json::from_str(text)?)
}

/// Parse GeoJSON text into a collection. A lone Feature or Geometry is wrapped.
pub fn parse_geojson(text: &str) -> Result<FeatureCollection> {
    to_feature_collection(parse_value(text)?)
}

pub fn to_feature_collection(value: Value) -> Result<FeatureCollection> {
    match value.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => Ok(serde_json::from_value(value)?),
        Some("Feature") => Ok(FeatureCollection::new(vec![serde_json::from_value(value)?])),
        _ => {
            let geometry: Geometry = serde_json::from_value(value)?;
            Ok(FeatureCollection::new(vec![Feature::with_properties(
                Some(geometry),
                Properties::new(),
            )]))
        }
    }
}

// JSON values a loose truthiness check would reject
fn is_falsy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn join_path(parent: &str, member: &str) -> String {
    if parent.is_empty() {
        member.to_string()
    } else {
        format!("{}.{}", parent, member)
    }
}

/// Structural check run before a document is accepted as a layer.
pub fn validate_structure(value: &Value) -> StructureValidation {
    let mut report = StructureValidation::default();

    if !value.is_object() {
        report.error("GeoJSON must be an object", "", "INVALID_TYPE");
        return report;
    }

    let kind = value.get("type");
    if is_falsy(kind) {
        report.error("Missing required \"type\" property", "", "MISSING_TYPE");
        return report;
    }

    match kind.and_then(Value::as_str) {
        Some("FeatureCollection") => validate_feature_collection(value, &mut report),
        Some("Feature") => validate_feature(value, "", &mut report),
        Some(name) if GEOMETRY_TYPES.contains(&name) => validate_geometry(value, "", &mut report),
        _ => {
            let shown = match kind {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            report.error(
                format!("Invalid GeoJSON type: {}", shown),
                "",
                "INVALID_GEOJSON_TYPE",
            );
        }
    }

    report.valid = report.errors.is_empty();
    report
}

fn validate_feature_collection(collection: &Value, report: &mut StructureValidation) {
    let Some(features) = collection.get("features").and_then(Value::as_array) else {
        report.error(
            "FeatureCollection must have a \"features\" array",
            "",
            "MISSING_FEATURES",
        );
        return;
    };

    for (index, feature) in features.iter().enumerate() {
        let path = format!("features[{}]", index);
        if feature.get("type").and_then(Value::as_str) != Some("Feature") {
            report.error(
                format!("Feature at index {} has invalid type", index),
                &path,
                "INVALID_FEATURE_TYPE",
            );
        }
        validate_feature(feature, &path, report);
    }
}

fn validate_feature(feature: &Value, path: &str, report: &mut StructureValidation) {
    match feature.get("geometry") {
        Some(Value::Null) => report.warning("Feature has null geometry", path),
        geometry if is_falsy(geometry) => report.error(
            "Feature must have a geometry property",
            path,
            "MISSING_GEOMETRY",
        ),
        Some(geometry) => validate_geometry(geometry, &join_path(path, "geometry"), report),
        None => {}
    }
}

fn validate_geometry(geometry: &Value, path: &str, report: &mut StructureValidation) {
    if geometry.get("type").and_then(Value::as_str) == Some("GeometryCollection") {
        if !geometry.get("geometries").is_some_and(Value::is_array) {
            report.error(
                "GeometryCollection must have geometries array",
                path,
                "MISSING_GEOMETRIES",
            );
        }
        return;
    }

    let coordinates = geometry.get("coordinates");
    if is_falsy(coordinates) {
        report.error("Geometry must have coordinates", path, "MISSING_COORDINATES");
        return;
    }
    if !coordinates.is_some_and(Value::is_array) {
        report.error("Coordinates must be an array", path, "INVALID_COORDINATES");
    }
}
