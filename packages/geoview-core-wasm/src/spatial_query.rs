//! Spatial and attribute queries over a feature slice.
//!
//! Every query borrows its input and returns references in input order unless
//! documented otherwise. A feature whose geometry cannot be evaluated simply
//! does not match.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::str::FromStr;

use crate::bbox_filter;
use crate::console_log;
use crate::error::GeometryError;
use crate::filter::display_text;
use crate::geometry_math::{self, SpatialRelation};
use crate::models::{BoundingBox, Feature, FeatureId, Geometry, Position};

pub const DEFAULT_NEAREST_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    pub relation: SpatialRelation,
    pub geometry: Geometry,
    /// Outward buffer applied to the query geometry, in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer: Option<f64>,
}

fn default_nearest_limit() -> usize {
    DEFAULT_NEAREST_LIMIT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestOptions {
    pub point: Position,
    #[serde(default = "default_nearest_limit")]
    pub limit: usize,
    /// Maximum distance in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_distance: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "startsWith")]
    StartsWith,
    #[serde(rename = "endsWith")]
    EndsWith,
}

impl FromStr for AttributeOperator {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            ">" => Ok(Self::Gt),
            "<" => Ok(Self::Lt),
            ">=" => Ok(Self::Gte),
            "<=" => Ok(Self::Lte),
            "contains" => Ok(Self::Contains),
            "startsWith" => Ok(Self::StartsWith),
            "endsWith" => Ok(Self::EndsWith),
            other => Err(GeometryError::InvalidArgument(format!(
                "unknown attribute operator '{}'",
                other
            ))),
        }
    }
}

/// Features standing in `relation` to the (optionally buffered) query geometry.
///
/// `contains` asks whether the query geometry contains the feature and
/// `within` whether the feature lies within the query geometry; the remaining
/// relations are evaluated as `relation(feature, query)`.
pub fn query<'a>(features: &'a [Feature], options: &QueryOptions) -> Vec<&'a Feature> {
    let query_geometry = match options.buffer {
        Some(meters) if meters > 0.0 => geometry_math::buffer(&options.geometry, meters)
            .unwrap_or_else(|| options.geometry.clone()),
        _ => options.geometry.clone(),
    };

    let Ok(query_geo) = geometry_math::to_geo(&query_geometry) else {
        console_log!("Spatial query geometry could not be evaluated");
        return Vec::new();
    };

    let relation = options.relation;
    let matches: Vec<&Feature> = features
        .iter()
        .filter(|feature| {
            let Some(geometry) = &feature.geometry else {
                return false;
            };
            if !bbox_filter::envelopes_may_intersect(geometry, &query_geometry) {
                return relation == SpatialRelation::Disjoint && geometry_math::to_geo(geometry).is_ok();
            }
            let Ok(feature_geo) = geometry_math::to_geo(geometry) else {
                return false;
            };
            match relation {
                SpatialRelation::Contains => {
                    geometry_math::relate_geo(&query_geo, &feature_geo, SpatialRelation::Contains)
                }
                other => geometry_math::relate_geo(&feature_geo, &query_geo, other),
            }
        })
        .collect();

    console_log!(
        "Spatial query ({:?}): {} of {} features matched",
        relation,
        matches.len(),
        features.len()
    );
    matches
}

/// Features ordered by ascending distance (meters) from `options.point`.
///
/// Non-point features are measured from their centroid. Features whose
/// distance cannot be computed sort last, or drop out when `max_distance` is set.
pub fn nearest<'a>(features: &'a [Feature], options: &NearestOptions) -> Vec<&'a Feature> {
    let mut ranked: Vec<(&Feature, f64)> = features
        .iter()
        .filter(|feature| feature.geometry.is_some())
        .map(|feature| {
            let distance = geometry_math::centroid(feature)
                .and_then(|center| geometry_math::distance(&options.point, &center))
                .unwrap_or(f64::INFINITY);
            (feature, distance)
        })
        .collect();

    if let Some(max_distance) = options.max_distance {
        ranked.retain(|(_, distance)| distance.is_finite() && *distance <= max_distance);
    }

    // sort_by is stable, so equal distances keep collection order
    ranked.sort_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    ranked.truncate(options.limit);

    ranked.into_iter().map(|(feature, _)| feature).collect()
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        _ => false,
    }
}

fn compare_values(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// One-shot attribute predicate. A missing or `null` property never matches,
/// whatever the operator.
pub fn matches_attribute(feature: &Feature, property: &str, operator: AttributeOperator, value: &Value) -> bool {
    let Some(actual) = feature.properties.get(property).filter(|v| !v.is_null()) else {
        return false;
    };

    match operator {
        AttributeOperator::Eq => values_equal(actual, value),
        AttributeOperator::Ne => !values_equal(actual, value),
        AttributeOperator::Gt => compare_values(actual, value) == Some(Ordering::Greater),
        AttributeOperator::Lt => compare_values(actual, value) == Some(Ordering::Less),
        AttributeOperator::Gte => matches!(
            compare_values(actual, value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        AttributeOperator::Lte => matches!(
            compare_values(actual, value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        AttributeOperator::Contains | AttributeOperator::StartsWith | AttributeOperator::EndsWith => {
            let haystack = display_text(actual).to_lowercase();
            let needle = display_text(value).to_lowercase();
            match operator {
                AttributeOperator::Contains => haystack.contains(&needle),
                AttributeOperator::StartsWith => haystack.starts_with(&needle),
                _ => haystack.ends_with(&needle),
            }
        }
    }
}

pub fn query_by_attribute<'a>(
    features: &'a [Feature],
    property: &str,
    operator: AttributeOperator,
    value: &Value,
) -> Vec<&'a Feature> {
    features
        .iter()
        .filter(|feature| matches_attribute(feature, property, operator, value))
        .collect()
}

/// Features within or crossing `bbox`. Boundary-crossing features are kept.
pub fn within_bounds<'a>(features: &'a [Feature], bbox: &BoundingBox) -> Vec<&'a Feature> {
    let Ok(bbox_geo) = geometry_math::to_geo(&bbox.to_polygon()) else {
        return Vec::new();
    };

    features
        .iter()
        .filter(|feature| {
            let Some(geometry) = &feature.geometry else {
                return false;
            };
            if let Geometry::Point { coordinates } = geometry {
                return bbox_filter::point_in_bbox(coordinates, bbox);
            }
            match bbox_filter::geometry_envelope(geometry) {
                Some(envelope) if envelope.intersects(bbox) => {}
                _ => return false,
            }
            let Ok(feature_geo) = geometry_math::to_geo(geometry) else {
                return false;
            };
            geometry_math::relate_geo(&feature_geo, &bbox_geo, SpatialRelation::Within)
                || geometry_math::relate_geo(&feature_geo, &bbox_geo, SpatialRelation::Intersects)
        })
        .collect()
}

fn is_polygonal(feature: &Feature) -> bool {
    feature
        .geometry_type()
        .map(|t| t.is_polygonal())
        .unwrap_or(false)
}

/// Union of every polygonal feature, folded left to right.
///
/// Non-polygonal features are ignored; a single polygon is returned as-is.
/// Any polygonal feature that cannot be converted makes the whole union `None`.
pub fn union(features: &[Feature]) -> Option<Feature> {
    let polygons: Vec<&Feature> = features.iter().filter(|f| is_polygonal(f)).collect();
    let converted = polygons
        .iter()
        .map(|feature| {
            feature
                .geometry
                .as_ref()
                .and_then(|geometry| geometry_math::to_multipolygon(geometry).ok())
        })
        .collect::<Option<Vec<_>>>()?;

    match polygons.as_slice() {
        [] => None,
        [single] => Some((*single).clone()),
        _ => {
            let merged = converted
                .into_iter()
                .reduce(|acc, next| geometry_math::union_polygons(&acc, &next))?;
            geometry_math::from_geo_multipolygon(&merged).map(Feature::new)
        }
    }
}

fn polygon_pair(a: &Feature, b: &Feature) -> Option<(geo_types::MultiPolygon<f64>, geo_types::MultiPolygon<f64>)> {
    if !is_polygonal(a) || !is_polygonal(b) {
        return None;
    }
    let left = geometry_math::to_multipolygon(a.geometry.as_ref()?).ok()?;
    let right = geometry_math::to_multipolygon(b.geometry.as_ref()?).ok()?;
    Some((left, right))
}

/// Shared area of two polygonal features; `None` when they do not overlap.
pub fn intersection(a: &Feature, b: &Feature) -> Option<Feature> {
    let (left, right) = polygon_pair(a, b)?;
    geometry_math::from_geo_multipolygon(&geometry_math::intersect_polygons(&left, &right))
        .map(Feature::new)
}

/// `a` minus `b`; `None` when nothing of `a` remains.
pub fn difference(a: &Feature, b: &Feature) -> Option<Feature> {
    let (left, right) = polygon_pair(a, b)?;
    geometry_math::from_geo_multipolygon(&geometry_math::subtract_polygons(&left, &right))
        .map(Feature::new)
}

fn same_id(a: &FeatureId, b: &FeatureId) -> bool {
    match (a, b) {
        (FeatureId::Number(x), FeatureId::Number(y)) => x.as_f64() == y.as_f64(),
        (FeatureId::String(x), FeatureId::String(y)) => x == y,
        _ => false,
    }
}

pub fn get_by_id<'a>(features: &'a [Feature], id: &FeatureId) -> Option<&'a Feature> {
    features
        .iter()
        .find(|feature| feature.id.as_ref().is_some_and(|own| same_id(own, id)))
}

/// Features whose id is in `ids`, in collection order.
pub fn get_by_ids<'a>(features: &'a [Feature], ids: &[FeatureId]) -> Vec<&'a Feature> {
    features
        .iter()
        .filter(|feature| {
            feature
                .id
                .as_ref()
                .is_some_and(|own| ids.iter().any(|id| same_id(own, id)))
        })
        .collect()
}

pub fn centroid_of(feature: &Feature) -> Option<Position> {
    geometry_math::centroid(feature).ok()
}

/// Envelope of the features that have a geometry.
pub fn bounds(features: &[Feature]) -> Option<BoundingBox> {
    bbox_filter::features_envelope(features)
}
