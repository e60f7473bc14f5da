//! Composable feature filtering: free text, geometry type set, then property predicates.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::models::Feature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Equals,
    Contains,
    Gt,
    Lt,
    Gte,
    Lte,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Number(f64),
    Text(String),
}

impl FilterValue {
    fn display_text(&self) -> String {
        match self {
            FilterValue::Number(n) => format_number(*n),
            FilterValue::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub property: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterCriteria {
    pub search_text: String,
    pub geometry_types: BTreeSet<String>,
    pub property_filters: Vec<PropertyFilter>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.search_text.trim().is_empty()
            && self.geometry_types.is_empty()
            && self.property_filters.is_empty()
    }
}

pub(crate) fn format_number(n: f64) -> String {
    format!("{}", n)
}

/// Text form used by the string operators: strings as-is, everything else as JSON text.
pub(crate) fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

fn matches_search(feature: &Feature, needle: &str) -> bool {
    let props_text = serde_json::to_string(&feature.properties)
        .unwrap_or_default()
        .to_lowercase();
    if props_text.contains(needle) {
        return true;
    }
    feature
        .geometry_type()
        .map(|t| t.as_str().to_lowercase().contains(needle))
        .unwrap_or(false)
}

fn matches_geometry_type(feature: &Feature, types: &BTreeSet<String>) -> bool {
    feature
        .geometry_type()
        .map(|t| types.contains(t.as_str()))
        .unwrap_or(false)
}

/// Evaluate one property predicate; a missing property never passes.
pub fn matches_property_filter(feature: &Feature, filter: &PropertyFilter) -> bool {
    let Some(value) = feature.properties.get(&filter.property) else {
        return false;
    };

    match filter.operator {
        FilterOperator::Equals => {
            display_text(value).to_lowercase() == filter.value.display_text().to_lowercase()
        }
        FilterOperator::Contains => display_text(value)
            .to_lowercase()
            .contains(&filter.value.display_text().to_lowercase()),
        FilterOperator::Gt | FilterOperator::Lt | FilterOperator::Gte | FilterOperator::Lte => {
            // numeric operators never coerce: both sides must be numbers
            let (Value::Number(n), FilterValue::Number(target)) = (value, &filter.value) else {
                return false;
            };
            let Some(actual) = n.as_f64() else {
                return false;
            };
            match filter.operator {
                FilterOperator::Gt => actual > *target,
                FilterOperator::Lt => actual < *target,
                FilterOperator::Gte => actual >= *target,
                _ => actual <= *target,
            }
        }
    }
}

/// Apply every stage of `criteria` as a strict AND chain, preserving input order.
///
/// Empty criteria return every feature.
pub fn apply_filters<'a>(features: &'a [Feature], criteria: &FilterCriteria) -> Vec<&'a Feature> {
    let mut filtered: Vec<&Feature> = features.iter().collect();

    if !criteria.search_text.trim().is_empty() {
        let needle = criteria.search_text.to_lowercase();
        filtered.retain(|feature| matches_search(feature, &needle));
    }

    if !criteria.geometry_types.is_empty() {
        filtered.retain(|feature| matches_geometry_type(feature, &criteria.geometry_types));
    }

    for filter in &criteria.property_filters {
        filtered.retain(|feature| matches_property_filter(feature, filter));
    }

    filtered
}

/// Every property name present on any feature, sorted.
pub fn unique_property_names(features: &[Feature]) -> Vec<String> {
    features
        .iter()
        .flat_map(|feature| feature.properties.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Every geometry type present, sorted by name.
pub fn unique_geometry_types(features: &[Feature]) -> Vec<String> {
    features
        .iter()
        .filter_map(|feature| feature.geometry_type())
        .map(|t| t.as_str().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureCollection;
    use rstest::rstest;
    use serde_json::json;

    fn sample() -> FeatureCollection {
        serde_json::from_value(json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "geometry": { "type": "Point", "coordinates": [0, 0] },
                  "properties": { "name": "Main Street Cafe", "p": 5, "kind": "cafe" } },
                { "type": "Feature", "geometry": { "type": "LineString", "coordinates": [[0, 0], [1, 1]] },
                  "properties": { "name": "Main Street", "p": "5", "lanes": 2 } },
                { "type": "Feature", "geometry": null,
                  "properties": { "name": "Orphan", "p": 12 } },
                { "type": "Feature", "geometry": { "type": "Polygon",
                  "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]] },
                  "properties": { "name": "Park", "p": 3.5 } }
            ]
        }))
        .expect("collection")
    }

    fn names(features: &[&Feature]) -> Vec<String> {
        features
            .iter()
            .map(|f| f.properties["name"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    fn criteria(raw: Value) -> FilterCriteria {
        serde_json::from_value(raw).expect("criteria")
    }

    #[test]
    fn empty_criteria_is_identity() {
        let fc = sample();
        let empty = criteria(json!({}));
        assert!(empty.is_empty());
        let result = apply_filters(&fc.features, &empty);
        assert_eq!(result.len(), fc.features.len());
        for (a, b) in result.iter().zip(fc.features.iter()) {
            assert!(std::ptr::eq(*a, b));
        }
    }

    #[test]
    fn search_text_matches_properties_and_geometry_type() {
        let fc = sample();
        let result = apply_filters(&fc.features, &criteria(json!({ "searchText": "STREET" })));
        assert_eq!(names(&result), vec!["Main Street Cafe", "Main Street"]);

        let result = apply_filters(&fc.features, &criteria(json!({ "searchText": "polyg" })));
        assert_eq!(names(&result), vec!["Park"]);

        let blank = criteria(json!({ "searchText": "   " }));
        assert_eq!(apply_filters(&fc.features, &blank).len(), 4);
    }

    #[test]
    fn geometry_type_set_drops_null_geometry() {
        let fc = sample();
        let result = apply_filters(
            &fc.features,
            &criteria(json!({ "geometryTypes": ["Point", "Polygon"] })),
        );
        assert_eq!(names(&result), vec!["Main Street Cafe", "Park"]);
        for feature in apply_filters(&fc.features, &criteria(json!({ "geometryTypes": ["LineString"] }))) {
            assert_eq!(feature.geometry_type().map(|t| t.as_str()), Some("LineString"));
        }
    }

    #[rstest]
    #[case(json!({ "property": "p", "operator": "gt", "value": 4 }), vec!["Main Street Cafe", "Orphan"])]
    #[case(json!({ "property": "p", "operator": "lte", "value": 5 }), vec!["Main Street Cafe", "Park"])]
    #[case(json!({ "property": "p", "operator": "lt", "value": "10" }), vec![])]
    #[case(json!({ "property": "name", "operator": "contains", "value": "main" }), vec!["Main Street Cafe", "Main Street"])]
    #[case(json!({ "property": "p", "operator": "equals", "value": "5" }), vec!["Main Street Cafe", "Main Street"])]
    #[case(json!({ "property": "lanes", "operator": "gte", "value": 2 }), vec!["Main Street"])]
    fn property_operators(#[case] filter: Value, #[case] expected: Vec<&str>) {
        let fc = sample();
        let result = apply_filters(
            &fc.features,
            &criteria(json!({ "propertyFilters": [filter] })),
        );
        assert_eq!(names(&result), expected);
    }

    #[test]
    fn repeated_filter_is_idempotent() {
        let fc = sample();
        let filter = json!({ "property": "p", "operator": "equals", "value": "5" });
        let once = apply_filters(&fc.features, &criteria(json!({ "propertyFilters": [filter.clone()] })));
        let twice = apply_filters(
            &fc.features,
            &criteria(json!({ "propertyFilters": [filter.clone(), filter] })),
        );
        assert_eq!(names(&once), names(&twice));
    }

    #[test]
    fn stages_compose_as_and() {
        let fc = sample();
        let result = apply_filters(
            &fc.features,
            &criteria(json!({
                "searchText": "main",
                "geometryTypes": ["LineString"],
                "propertyFilters": [{ "property": "lanes", "operator": "equals", "value": 2 }]
            })),
        );
        assert_eq!(names(&result), vec!["Main Street"]);
    }

    #[test]
    fn unique_names_and_types_are_sorted() {
        let fc = sample();
        assert_eq!(
            unique_property_names(&fc.features),
            vec!["kind", "lanes", "name", "p"]
        );
        assert_eq!(
            unique_geometry_types(&fc.features),
            vec!["LineString", "Point", "Polygon"]
        );
    }
}
