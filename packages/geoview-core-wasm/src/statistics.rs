//! Single-pass dataset statistics computed when a layer is loaded.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::geometry_math;
use crate::models::{BoundingBox, FeatureCollection};
use crate::{console_log, console_warn};

/// String properties report at most this many frequent values.
pub const TOP_VALUES_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsResult {
    pub feature_count: usize,
    pub geometry_types: BTreeMap<String, usize>,
    pub bounds: BoundingBox,
    pub properties: Vec<PropertyStatistics>,
    /// Square kilometres; absent when no polygon contributed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_area: Option<f64>,
    /// Kilometres; absent when no line contributed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_length: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Number,
    Boolean,
    Object,
    Null,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopValue {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyStatistics {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PropertyType,
    pub unique_values: usize,
    pub null_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_values: Option<Vec<TopValue>>,
}

fn value_type(value: &Value) -> PropertyType {
    match value {
        Value::Null => PropertyType::Null,
        Value::Bool(_) => PropertyType::Boolean,
        Value::Number(_) => PropertyType::Number,
        Value::String(_) => PropertyType::String,
        Value::Array(_) | Value::Object(_) => PropertyType::Object,
    }
}

// Identity used for distinct counting; numbers compare by value so 1 and 1.0 collapse,
// as do 0 and -0
fn unique_key(value: &Value) -> String {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) => format!("n:{}", if f == 0.0 { 0.0 } else { f }),
            None => format!("n:{}", n),
        },
        Value::String(s) => format!("s:{}", s),
        Value::Bool(b) => format!("b:{}", b),
        other => format!("o:{}", other),
    }
}

// Property values in first-seen key order
#[derive(Default)]
struct PropertyColumns<'a> {
    order: Vec<&'a str>,
    values: HashMap<&'a str, Vec<&'a Value>>,
}

impl<'a> PropertyColumns<'a> {
    fn push(&mut self, key: &'a str, value: &'a Value) {
        self.values
            .entry(key)
            .or_insert_with(|| {
                self.order.push(key);
                Vec::new()
            })
            .push(value);
    }
}

/// Analyse a whole collection in one pass.
///
/// Measurement failures on individual features are logged and skipped; they
/// never abort the analysis.
pub fn analyze(collection: &FeatureCollection) -> StatisticsResult {
    let mut geometry_types: BTreeMap<String, usize> = BTreeMap::new();
    let mut columns = PropertyColumns::default();
    let mut total_area_m2 = 0.0;
    let mut total_length_m = 0.0;

    for (index, feature) in collection.features.iter().enumerate() {
        let type_name = feature
            .geometry_type()
            .map(|t| t.as_str())
            .unwrap_or("null");
        *geometry_types.entry(type_name.to_string()).or_insert(0) += 1;

        if let Some(geometry) = &feature.geometry {
            let kind = geometry.geometry_type();
            if kind.is_polygonal() {
                match geometry_math::geometry_area(geometry) {
                    Ok(area) => total_area_m2 += area,
                    Err(e) => console_warn!("Skipping area of feature {}: {}", index, e),
                }
            }
            if kind.is_linear() {
                match geometry_math::geometry_length(geometry) {
                    Ok(length) => total_length_m += length,
                    Err(e) => console_warn!("Skipping length of feature {}: {}", index, e),
                }
            }
        }

        for (key, value) in &feature.properties {
            columns.push(key, value);
        }
    }

    let bounds = geometry_math::bounding_box(&collection.features).unwrap_or_else(|_| BoundingBox::zero());

    let properties: Vec<PropertyStatistics> = columns
        .order
        .iter()
        .map(|name| analyze_property(name, &columns.values[name]))
        .collect();

    let total_area = total_area_m2 / 1_000_000.0;
    let total_length = total_length_m / 1000.0;

    console_log!(
        "Analyzed {} features, {} properties",
        collection.features.len(),
        properties.len()
    );

    StatisticsResult {
        feature_count: collection.features.len(),
        geometry_types,
        bounds,
        properties,
        total_area: (total_area > 0.0).then_some(total_area),
        total_length: (total_length > 0.0).then_some(total_length),
    }
}

/// Summarise one property column.
pub fn analyze_property(name: &str, values: &[&Value]) -> PropertyStatistics {
    let non_null: Vec<&Value> = values.iter().copied().filter(|v| !v.is_null()).collect();
    let null_count = values.len() - non_null.len();

    let types: HashSet<PropertyType> = non_null.iter().map(|v| value_type(v)).collect();
    let kind = match types.len() {
        0 => PropertyType::Null,
        1 => types.into_iter().next().unwrap_or(PropertyType::Null),
        _ => PropertyType::Mixed,
    };

    let unique_values = non_null
        .iter()
        .map(|v| unique_key(v))
        .collect::<HashSet<_>>()
        .len();

    let mut stats = PropertyStatistics {
        name: name.to_string(),
        kind,
        unique_values,
        null_count,
        min: None,
        max: None,
        mean: None,
        median: None,
        top_values: None,
    };

    match kind {
        PropertyType::Number => {
            let numbers: Vec<f64> = non_null.iter().filter_map(|v| v.as_f64()).collect();
            if !numbers.is_empty() {
                stats.min = numbers.iter().copied().reduce(f64::min);
                stats.max = numbers.iter().copied().reduce(f64::max);
                stats.mean = Some(numbers.iter().sum::<f64>() / numbers.len() as f64);
                stats.median = median(&numbers);
            }
        }
        PropertyType::String => {
            let strings = non_null.iter().filter_map(|v| v.as_str());
            stats.top_values = Some(top_values(strings, TOP_VALUES_LIMIT));
        }
        _ => {}
    }

    stats
}

/// Midpoint average for even counts, middle element for odd counts.
pub fn median(numbers: &[f64]) -> Option<f64> {
    if numbers.is_empty() {
        return None;
    }
    let mut sorted = numbers.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Most frequent values, descending; ties keep first-seen order.
pub fn top_values<'a>(values: impl Iterator<Item = &'a str>, limit: usize) -> Vec<TopValue> {
    let mut counts: Vec<TopValue> = Vec::new();
    let mut slots: HashMap<&'a str, usize> = HashMap::new();

    for value in values {
        match slots.get(value) {
            Some(&slot) => counts[slot].count += 1,
            None => {
                slots.insert(value, counts.len());
                counts.push(TopValue {
                    value: value.to_string(),
                    count: 1,
                });
            }
        }
    }

    // sort_by is stable, which keeps insertion order among equal counts
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(limit);
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Feature, Geometry};
    use rstest::rstest;
    use serde_json::json;

    fn collection(raw: Value) -> FeatureCollection {
        serde_json::from_value(raw).expect("feature collection")
    }

    fn props_only(props: Vec<Value>) -> FeatureCollection {
        collection(json!({
            "type": "FeatureCollection",
            "features": props
                .into_iter()
                .map(|p| json!({ "type": "Feature", "geometry": null, "properties": p }))
                .collect::<Vec<_>>()
        }))
    }

    #[test]
    fn mixed_types_are_detected() {
        let result = analyze(&props_only(vec![json!({"p": 1}), json!({"p": 2}), json!({"p": "x"})]));
        let p = &result.properties[0];
        assert_eq!(p.name, "p");
        assert_eq!(p.kind, PropertyType::Mixed);
        assert_eq!(p.unique_values, 3);
        assert_eq!(p.null_count, 0);
        assert!(p.min.is_none() && p.top_values.is_none());
    }

    #[rstest]
    #[case(&[1.0, 2.0, 3.0, 4.0], 2.5)]
    #[case(&[1.0, 2.0, 3.0], 2.0)]
    #[case(&[4.0, 1.0, 3.0, 2.0], 2.5)]
    #[case(&[7.0], 7.0)]
    fn median_rule(#[case] values: &[f64], #[case] expected: f64) {
        assert_eq!(median(values), Some(expected));
    }

    #[test]
    fn numeric_summary() {
        let result = analyze(&props_only(vec![
            json!({"n": 4}),
            json!({"n": 1.0}),
            json!({"n": null}),
            json!({"n": 1}),
            json!({"n": 2}),
        ]));
        let n = &result.properties[0];
        assert_eq!(n.kind, PropertyType::Number);
        assert_eq!(n.null_count, 1);
        assert_eq!(n.unique_values, 3);
        assert_eq!(n.min, Some(1.0));
        assert_eq!(n.max, Some(4.0));
        assert_eq!(n.mean, Some(2.0));
        assert_eq!(n.median, Some(1.5));
    }

    #[test]
    fn signed_zeros_count_as_one_value() {
        let result = analyze(&props_only(vec![json!({"z": 0}), json!({"z": -0.0}), json!({"z": 0.0})]));
        assert_eq!(result.properties[0].unique_values, 1);
    }

    #[test]
    fn only_nulls_is_null_type() {
        let result = analyze(&props_only(vec![json!({"x": null}), json!({"x": null})]));
        assert_eq!(result.properties[0].kind, PropertyType::Null);
        assert_eq!(result.properties[0].null_count, 2);
        assert_eq!(result.properties[0].unique_values, 0);
    }

    #[test]
    fn top_values_break_ties_by_first_seen() {
        let values = ["b", "a", "c", "a", "b", "d"];
        let top = top_values(values.into_iter(), 3);
        let order: Vec<(&str, usize)> = top.iter().map(|t| (t.value.as_str(), t.count)).collect();
        assert_eq!(order, vec![("b", 2), ("a", 2), ("c", 1)]);
    }

    #[test]
    fn top_values_are_truncated() {
        let props: Vec<Value> = (0..15).map(|i| json!({ "name": format!("v{}", i) })).collect();
        let result = analyze(&props_only(props));
        let top = result.properties[0].top_values.as_ref().expect("top values");
        assert_eq!(top.len(), TOP_VALUES_LIMIT);
        assert_eq!(top[0].value, "v0");
    }

    #[test]
    fn property_order_follows_first_sighting() {
        let result = analyze(&props_only(vec![json!({"b": 1}), json!({"a": 1, "b": 2}), json!({"c": true})]));
        let names: Vec<&str> = result.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert_eq!(result.properties[0].unique_values, 2);
        assert_eq!(result.properties[2].kind, PropertyType::Boolean);
    }

    #[test]
    fn geometry_histogram_totals_and_bounds() {
        let fc = FeatureCollection::new(vec![
            Feature::new(Geometry::Polygon {
                coordinates: vec![vec![
                    vec![0.0, 0.0],
                    vec![1.0, 0.0],
                    vec![1.0, 1.0],
                    vec![0.0, 1.0],
                    vec![0.0, 0.0],
                ]],
            }),
            Feature::new(Geometry::LineString {
                coordinates: vec![vec![0.0, 0.0], vec![0.0, 1.0]],
            }),
            Feature::with_properties(None, Default::default()),
            // malformed: skipped, not fatal
            Feature::new(Geometry::Polygon {
                coordinates: vec![vec![vec![0.0, 0.0]]],
            }),
        ]);
        let result = analyze(&fc);
        assert_eq!(result.feature_count, 4);
        assert_eq!(result.geometry_types["Polygon"], 2);
        assert_eq!(result.geometry_types["LineString"], 1);
        assert_eq!(result.geometry_types["null"], 1);
        let area = result.total_area.expect("area");
        assert!((area - 12_391.0).abs() < 60.0, "got {area}");
        let length = result.total_length.expect("length");
        assert!((length - 111.195).abs() < 0.01, "got {length}");
        assert_eq!(result.bounds, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn absent_measurements_are_omitted() {
        let fc = FeatureCollection::new(vec![Feature::new(Geometry::Point {
            coordinates: vec![1.0, 2.0],
        })]);
        let result = analyze(&fc);
        assert!(result.total_area.is_none());
        assert!(result.total_length.is_none());
        let raw = serde_json::to_value(&result).expect("serialize");
        assert!(raw.get("totalArea").is_none());
        assert_eq!(raw["featureCount"], 1);
    }

    #[test]
    fn empty_collection_gets_zero_bounds() {
        let result = analyze(&FeatureCollection::default());
        assert_eq!(result.bounds, BoundingBox::zero());
        assert_eq!(result.feature_count, 0);
    }
}
