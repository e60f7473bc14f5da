use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;

// Create a console module for logging
pub mod console;
// Error type shared by every module
pub mod error;
// GeoJSON data model
pub mod models;
// GeoJSON text ingestion and structural validation
pub mod parser;
// Envelope prefilters for spatial predicates
pub mod bbox_filter;
// Spherical measurements, buffers and DE-9IM predicates
pub mod geometry_math;
// WGS84 range, projection and CRS checks
pub mod coordinate_validator;
// Per-layer statistics
pub mod statistics;
// Search / geometry type / property filters
pub mod filter;
// Spatial and attribute queries
pub mod spatial_query;
// Interactive measurement session
pub mod measurement;

use measurement::{MeasurementMode, MeasurementSession, MeasurementStore};
use models::{BoundingBox, Feature, FeatureCollection, FeatureId, Position};

#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => ($crate::console::log(&format!($($t)*)))
}

#[macro_export]
macro_rules! console_warn {
    ($($t:tt)*) => ($crate::console::warn(&format!($($t)*)))
}

use std::sync::Once;
static INIT: Once = Once::new();

// This sets up the wasm_bindgen start functionality
#[wasm_bindgen(start)]
pub fn start() {
    INIT.call_once(|| {
        // Set the panic hook for better error messages
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        console_log!("GeoView WASM core initialized");
    });
}

// Results cross the boundary as plain JS objects, never as Maps
fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(JsValue::from)
}

fn js_error(context: &str, err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, err))
}

fn parse_json<T: serde::de::DeserializeOwned>(json: &str, what: &str) -> Result<T, JsValue> {
    serde_json::from_str(json).map_err(|e| js_error(&format!("Failed to parse {}", what), e))
}

// Accepts either a FeatureCollection (or lone Feature/Geometry) or a bare feature array
fn parse_features(json: &str) -> Result<Vec<Feature>, JsValue> {
    let value: Value = parse_json(json, "features")?;
    if value.is_array() {
        return serde_json::from_value(value).map_err(|e| js_error("Failed to parse features", e));
    }
    parser::to_feature_collection(value)
        .map(|collection| collection.features)
        .map_err(|e| js_error("Failed to parse features", e))
}

fn parse_collection(json: &str) -> Result<FeatureCollection, JsValue> {
    parse_features(json).map(FeatureCollection::new)
}

// ---- Ingestion ----

#[wasm_bindgen]
pub fn parse_geojson(text: &str) -> Result<JsValue, JsValue> {
    let collection = parser::parse_geojson(text).map_err(|e| JsValue::from_str(&e.to_string()))?;
    console_log!("Parsed GeoJSON with {} features", collection.len());
    to_js(&collection)
}

#[wasm_bindgen]
pub fn validate_geojson(text: &str) -> Result<JsValue, JsValue> {
    let value = parser::parse_value(text).map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_js(&parser::validate_structure(&value))
}

// ---- Coordinate validation ----

#[wasm_bindgen]
pub fn validate_coordinates(collection_json: &str) -> Result<JsValue, JsValue> {
    let collection = parse_collection(collection_json)?;
    to_js(&coordinate_validator::validate_coordinates(&collection))
}

#[wasm_bindgen]
pub fn detect_projection_issues(collection_json: &str) -> Result<JsValue, JsValue> {
    let collection = parse_collection(collection_json)?;
    to_js(&coordinate_validator::detect_projection_issues(&collection))
}

/// CRS information from the raw document text.
#[wasm_bindgen]
pub fn detect_crs(raw_json: &str) -> Result<JsValue, JsValue> {
    let raw: Value = parse_json(raw_json, "GeoJSON")?;
    to_js(&coordinate_validator::detect_crs(&raw))
}

#[wasm_bindgen]
pub fn format_crs_display(crs_json: &str) -> Result<String, JsValue> {
    let info: coordinate_validator::CrsInfo = parse_json(crs_json, "CRS info")?;
    Ok(coordinate_validator::format_crs_display(&info))
}

#[wasm_bindgen]
pub fn wgs84_description() -> String {
    coordinate_validator::wgs84_description().to_string()
}

// ---- Statistics ----

#[wasm_bindgen]
pub fn analyze_statistics(collection_json: &str) -> Result<JsValue, JsValue> {
    let collection = parse_collection(collection_json)?;
    to_js(&statistics::analyze(&collection))
}

// ---- Filtering ----

#[wasm_bindgen]
pub fn apply_filters(features_json: &str, criteria_json: &str) -> Result<JsValue, JsValue> {
    let features = parse_features(features_json)?;
    let criteria: filter::FilterCriteria = parse_json(criteria_json, "filter criteria")?;
    let filtered = filter::apply_filters(&features, &criteria);
    console_log!("Filtered {} features down to {}", features.len(), filtered.len());
    to_js(&filtered)
}

#[wasm_bindgen]
pub fn unique_property_names(features_json: &str) -> Result<JsValue, JsValue> {
    let features = parse_features(features_json)?;
    to_js(&filter::unique_property_names(&features))
}

#[wasm_bindgen]
pub fn unique_geometry_types(features_json: &str) -> Result<JsValue, JsValue> {
    let features = parse_features(features_json)?;
    to_js(&filter::unique_geometry_types(&features))
}

// ---- Spatial queries ----

#[wasm_bindgen]
pub fn spatial_query(features_json: &str, options_json: &str) -> Result<JsValue, JsValue> {
    let features = parse_features(features_json)?;
    let options: spatial_query::QueryOptions = parse_json(options_json, "query options")?;
    to_js(&spatial_query::query(&features, &options))
}

#[wasm_bindgen]
pub fn nearest_features(features_json: &str, options_json: &str) -> Result<JsValue, JsValue> {
    let features = parse_features(features_json)?;
    let options: spatial_query::NearestOptions = parse_json(options_json, "nearest options")?;
    to_js(&spatial_query::nearest(&features, &options))
}

#[wasm_bindgen]
pub fn query_by_attribute(
    features_json: &str,
    property: &str,
    operator: &str,
    value_json: &str,
) -> Result<JsValue, JsValue> {
    let features = parse_features(features_json)?;
    let operator: spatial_query::AttributeOperator =
        operator.parse().map_err(|e| JsValue::from_str(&format!("{}", e)))?;
    let value: Value = parse_json(value_json, "attribute value")?;
    to_js(&spatial_query::query_by_attribute(&features, property, operator, &value))
}

/// `bbox_json` is `[minLng, minLat, maxLng, maxLat]`.
#[wasm_bindgen]
pub fn within_bounds(features_json: &str, bbox_json: &str) -> Result<JsValue, JsValue> {
    let features = parse_features(features_json)?;
    let bbox = BoundingBox::from_array(parse_json(bbox_json, "bounding box")?);
    to_js(&spatial_query::within_bounds(&features, &bbox))
}

/// Polygon union of every polygonal feature, or `null`.
#[wasm_bindgen]
pub fn union_features(features_json: &str) -> Result<JsValue, JsValue> {
    let features = parse_features(features_json)?;
    to_js(&spatial_query::union(&features))
}

#[wasm_bindgen]
pub fn intersect_features(a_json: &str, b_json: &str) -> Result<JsValue, JsValue> {
    let a: Feature = parse_json(a_json, "feature")?;
    let b: Feature = parse_json(b_json, "feature")?;
    to_js(&spatial_query::intersection(&a, &b))
}

#[wasm_bindgen]
pub fn difference_features(a_json: &str, b_json: &str) -> Result<JsValue, JsValue> {
    let a: Feature = parse_json(a_json, "feature")?;
    let b: Feature = parse_json(b_json, "feature")?;
    to_js(&spatial_query::difference(&a, &b))
}

#[wasm_bindgen]
pub fn get_feature_by_id(features_json: &str, id_json: &str) -> Result<JsValue, JsValue> {
    let features = parse_features(features_json)?;
    let id: FeatureId = parse_json(id_json, "feature id")?;
    to_js(&spatial_query::get_by_id(&features, &id))
}

#[wasm_bindgen]
pub fn get_features_by_ids(features_json: &str, ids_json: &str) -> Result<JsValue, JsValue> {
    let features = parse_features(features_json)?;
    let ids: Vec<FeatureId> = parse_json(ids_json, "feature ids")?;
    to_js(&spatial_query::get_by_ids(&features, &ids))
}

#[wasm_bindgen]
pub fn feature_centroid(feature_json: &str) -> Result<JsValue, JsValue> {
    let feature: Feature = parse_json(feature_json, "feature")?;
    to_js(&spatial_query::centroid_of(&feature))
}

#[wasm_bindgen]
pub fn features_bounds(features_json: &str) -> Result<JsValue, JsValue> {
    let features = parse_features(features_json)?;
    to_js(&spatial_query::bounds(&features))
}

#[wasm_bindgen]
pub fn convex_hull(features_json: &str) -> Result<JsValue, JsValue> {
    let features = parse_features(features_json)?;
    to_js(&geometry_math::convex_hull(&features))
}

/// Circular polygon of `meters` around a point, or `null`.
#[wasm_bindgen]
pub fn buffer_point(lng: f64, lat: f64, meters: f64) -> Result<JsValue, JsValue> {
    to_js(&geometry_math::buffer_point(&[lng, lat], meters))
}

#[wasm_bindgen]
pub fn relate_geometries(a_json: &str, b_json: &str, relation: &str) -> Result<bool, JsValue> {
    let a: models::Geometry = parse_json(a_json, "geometry")?;
    let b: models::Geometry = parse_json(b_json, "geometry")?;
    let relation: geometry_math::SpatialRelation =
        serde_json::from_value(Value::String(relation.to_string()))
            .map_err(|e| js_error("Unknown spatial relation", e))?;
    Ok(geometry_math::relate(&a, &b, relation))
}

// ---- Measurements ----

#[wasm_bindgen]
pub fn calculate_distance(lng1: f64, lat1: f64, lng2: f64, lat2: f64) -> Result<f64, JsValue> {
    geometry_math::distance(&[lng1, lat1], &[lng2, lat2]).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn calculate_bearing(lng1: f64, lat1: f64, lng2: f64, lat2: f64) -> Result<f64, JsValue> {
    geometry_math::bearing(&[lng1, lat1], &[lng2, lat2]).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn calculate_area(coordinates_json: &str) -> Result<f64, JsValue> {
    let ring: Vec<Position> = parse_json(coordinates_json, "coordinates")?;
    geometry_math::area(&ring).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn calculate_perimeter(coordinates_json: &str) -> Result<f64, JsValue> {
    let points: Vec<Position> = parse_json(coordinates_json, "coordinates")?;
    geometry_math::perimeter(&points).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn format_distance(meters: f64) -> String {
    measurement::format_distance(meters)
}

#[wasm_bindgen]
pub fn format_area(square_meters: f64) -> String {
    measurement::format_area(square_meters)
}

#[wasm_bindgen]
pub fn format_bearing(degrees: f64) -> String {
    measurement::format_bearing(degrees)
}

#[wasm_bindgen]
pub fn convert_distance(meters: f64, unit: &str) -> Result<f64, JsValue> {
    let unit: measurement::DistanceUnit = unit.parse().map_err(|e| JsValue::from_str(&format!("{}", e)))?;
    Ok(measurement::convert_distance(meters, unit))
}

#[wasm_bindgen]
pub fn convert_area(square_meters: f64, unit: &str) -> Result<f64, JsValue> {
    let unit: measurement::AreaUnit = unit.parse().map_err(|e| JsValue::from_str(&format!("{}", e)))?;
    Ok(measurement::convert_area(square_meters, unit))
}

/// Owns the measurement session of one map view and the results it produced.
#[wasm_bindgen]
#[derive(Default)]
pub struct MeasurementController {
    session: MeasurementSession,
    store: MeasurementStore,
}

#[wasm_bindgen]
impl MeasurementController {
    #[wasm_bindgen(constructor)]
    pub fn new() -> MeasurementController {
        MeasurementController::default()
    }

    pub fn start(&mut self, mode: &str) -> Result<(), JsValue> {
        let mode: MeasurementMode = mode.parse().map_err(|e| JsValue::from_str(&format!("{}", e)))?;
        self.session.start(mode);
        Ok(())
    }

    pub fn add_point(&mut self, lng: f64, lat: f64) -> Result<(), JsValue> {
        self.session
            .add_point(vec![lng, lat])
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// The new result, or `null` when the session cannot complete yet.
    pub fn complete(&mut self) -> Result<JsValue, JsValue> {
        match self.session.complete() {
            Some(result) => {
                let js = to_js(&result)?;
                console_log!("Completed {} measurement: {}", result.kind, result.label);
                self.store.push(result);
                Ok(js)
            }
            None => Ok(JsValue::NULL),
        }
    }

    pub fn cancel(&mut self) {
        self.session.cancel();
    }

    #[wasm_bindgen(getter)]
    pub fn mode(&self) -> Option<String> {
        self.session.mode().map(|mode| mode.to_string())
    }

    #[wasm_bindgen(getter)]
    pub fn collecting(&self) -> bool {
        self.session.is_collecting()
    }

    pub fn points(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.points())
    }

    pub fn measurements(&self) -> Result<JsValue, JsValue> {
        to_js(self.store.as_slice())
    }

    pub fn remove_measurement(&mut self, id: &str) -> bool {
        self.store.remove(id)
    }

    pub fn clear_measurements(&mut self) {
        self.store.clear();
    }
}
