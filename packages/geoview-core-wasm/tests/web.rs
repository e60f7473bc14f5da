//! Browser smoke tests for the exported bindings.
#![cfg(target_arch = "wasm32")]

use geoview_core_wasm::*;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

const LAYER: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        { "type": "Feature", "id": 1, "geometry": { "type": "Point", "coordinates": [0.5, 0.5] }, "properties": { "name": "a", "p": 5 } },
        { "type": "Feature", "id": 2, "geometry": { "type": "Point", "coordinates": [200, 45] }, "properties": { "name": "b", "p": "x" } }
    ]
}"#;

fn length(value: &JsValue) -> u32 {
    js_sys::Array::from(value).length()
}

#[wasm_bindgen_test]
fn parses_and_validates() {
    let parsed = parse_geojson(LAYER).unwrap();
    assert!(parsed.is_object());

    let validation = validate_coordinates(LAYER).unwrap();
    let count = js_sys::Reflect::get(&validation, &JsValue::from_str("outOfBoundsCount")).unwrap();
    assert_eq!(count.as_f64(), Some(1.0));

    assert!(parse_geojson("{ nope").is_err());
}

#[wasm_bindgen_test]
fn filters_return_plain_arrays() {
    let all = apply_filters(LAYER, "{}").unwrap();
    assert_eq!(length(&all), 2);

    let numeric = apply_filters(
        LAYER,
        r#"{ "propertyFilters": [{ "property": "p", "operator": "gt", "value": 1 }] }"#,
    )
    .unwrap();
    assert_eq!(length(&numeric), 1);
}

#[wasm_bindgen_test]
fn nearest_and_empty_union() {
    let nearest = nearest_features(LAYER, r#"{ "point": [0, 0], "maxDistance": 0 }"#).unwrap();
    assert_eq!(length(&nearest), 0);
    assert!(union_features(LAYER).unwrap().is_null());
}

#[wasm_bindgen_test]
fn measurement_controller_round_trip() {
    let mut controller = MeasurementController::new();
    assert!(controller.add_point(0.0, 0.0).is_err());

    controller.start("bearing").unwrap();
    controller.add_point(0.0, 0.0).unwrap();
    controller.add_point(1.0, 0.0).unwrap();
    let result = controller.complete().unwrap();
    assert!(!result.is_null());
    assert!(!controller.collecting());
    assert_eq!(length(&controller.measurements().unwrap()), 1);

    controller.clear_measurements();
    assert_eq!(length(&controller.measurements().unwrap()), 0);
    assert!(controller.start("volume").is_err());
}

#[wasm_bindgen_test]
fn labels() {
    assert_eq!(format_distance(1500.0), "1.50 km");
    assert_eq!(format_bearing(90.0), "90.0° (E)");
    assert_eq!(convert_distance(1000.0, "km").unwrap(), 1.0);
}
