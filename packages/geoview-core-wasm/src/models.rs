// This is the models module containing the GeoJSON data structures shared by every engine
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// `[longitude, latitude, altitude?]` in WGS84 decimal degrees.
pub type Position = Vec<f64>;

/// Feature properties keep their insertion order (serde_json `preserve_order`).
pub type Properties = Map<String, Value>;

// GeoJSON geometry, tagged by its "type" member exactly as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::MultiPoint => "MultiPoint",
            GeometryType::LineString => "LineString",
            GeometryType::MultiLineString => "MultiLineString",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPolygon => "MultiPolygon",
            GeometryType::GeometryCollection => "GeometryCollection",
        }
    }

    pub fn is_polygonal(&self) -> bool {
        matches!(self, GeometryType::Polygon | GeometryType::MultiPolygon)
    }

    pub fn is_linear(&self) -> bool {
        matches!(self, GeometryType::LineString | GeometryType::MultiLineString)
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Geometry {
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point { .. } => GeometryType::Point,
            Geometry::MultiPoint { .. } => GeometryType::MultiPoint,
            Geometry::LineString { .. } => GeometryType::LineString,
            Geometry::MultiLineString { .. } => GeometryType::MultiLineString,
            Geometry::Polygon { .. } => GeometryType::Polygon,
            Geometry::MultiPolygon { .. } => GeometryType::MultiPolygon,
            Geometry::GeometryCollection { .. } => GeometryType::GeometryCollection,
        }
    }

    /// Visit every position, recursing through geometry collections.
    pub fn for_each_position<F>(&self, visit: &mut F)
    where
        F: FnMut(&Position),
    {
        match self {
            Geometry::Point { coordinates } => visit(coordinates),
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                coordinates.iter().for_each(|position| visit(position))
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => coordinates
                .iter()
                .flatten()
                .for_each(|position| visit(position)),
            Geometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .flatten()
                .flatten()
                .for_each(|position| visit(position)),
            Geometry::GeometryCollection { geometries } => {
                for geometry in geometries {
                    geometry.for_each_position(visit);
                }
            }
        }
    }

    pub fn positions(&self) -> Vec<&Position> {
        let mut positions = Vec::new();
        self.collect_positions(&mut positions);
        positions
    }

    fn collect_positions<'a>(&'a self, out: &mut Vec<&'a Position>) {
        match self {
            Geometry::Point { coordinates } => out.push(coordinates),
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                out.extend(coordinates.iter())
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
                out.extend(coordinates.iter().flatten())
            }
            Geometry::MultiPolygon { coordinates } => {
                out.extend(coordinates.iter().flatten().flatten())
            }
            Geometry::GeometryCollection { geometries } => {
                for geometry in geometries {
                    geometry.collect_positions(out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    Number(serde_json::Number),
    String(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureTag {
    #[default]
    Feature,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureCollectionTag {
    #[default]
    FeatureCollection,
}

// GeoJSON feature: geometry may be null, properties are arbitrary JSON values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default)]
    pub kind: FeatureTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FeatureId>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Properties,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            kind: FeatureTag::Feature,
            id: None,
            geometry: Some(geometry),
            properties: Properties::new(),
        }
    }

    pub fn with_properties(geometry: Option<Geometry>, properties: Properties) -> Self {
        Self {
            kind: FeatureTag::Feature,
            id: None,
            geometry,
            properties,
        }
    }

    pub fn geometry_type(&self) -> Option<GeometryType> {
        self.geometry.as_ref().map(Geometry::geometry_type)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Properties, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Properties>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default)]
    pub kind: FeatureCollectionTag,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: FeatureCollectionTag::FeatureCollection,
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }
}

/// Axis-aligned bounding box in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Self {
        Self {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// `[minLng, minLat, maxLng, maxLat]`, the order used by GeoJSON `bbox` members.
    pub fn from_array(bbox: [f64; 4]) -> Self {
        Self::new(bbox[0], bbox[1], bbox[2], bbox[3])
    }

    pub fn extend(&mut self, lng: f64, lat: f64) {
        self.min_lng = self.min_lng.min(lng);
        self.min_lat = self.min_lat.min(lat);
        self.max_lng = self.max_lng.max(lng);
        self.max_lat = self.max_lat.max(lat);
    }

    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        lng >= self.min_lng && lng <= self.max_lng && lat >= self.min_lat && lat <= self.max_lat
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lng <= other.max_lng
            && self.max_lng >= other.min_lng
            && self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
    }

    pub fn to_polygon(&self) -> Geometry {
        Geometry::Polygon {
            coordinates: vec![vec![
                vec![self.min_lng, self.min_lat],
                vec![self.max_lng, self.min_lat],
                vec![self.max_lng, self.max_lat],
                vec![self.min_lng, self.max_lat],
                vec![self.min_lng, self.min_lat],
            ]],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn feature_roundtrips_through_geojson() {
        let raw = json!({
            "type": "Feature",
            "id": 7,
            "geometry": { "type": "Point", "coordinates": [10.0, 20.0] },
            "properties": { "name": "a", "rank": 2 }
        });
        let feature: Feature = serde_json::from_value(raw.clone()).expect("feature");
        assert_eq!(feature.geometry_type(), Some(GeometryType::Point));
        assert_eq!(feature.id, Some(FeatureId::Number(7.into())));
        assert_eq!(serde_json::to_value(&feature).expect("serialize"), raw);
    }

    #[test]
    fn null_properties_and_geometry_are_accepted() {
        let feature: Feature = serde_json::from_value(json!({
            "type": "Feature",
            "geometry": null,
            "properties": null
        }))
        .expect("feature");
        assert!(feature.geometry.is_none());
        assert!(feature.properties.is_empty());
    }

    #[test]
    fn positions_recurse_into_collections() {
        let geometry: Geometry = serde_json::from_value(json!({
            "type": "GeometryCollection",
            "geometries": [
                { "type": "Point", "coordinates": [1.0, 2.0] },
                { "type": "LineString", "coordinates": [[0.0, 0.0], [3.0, 4.0]] }
            ]
        }))
        .expect("geometry");
        assert_eq!(geometry.positions().len(), 3);

        let mut count = 0;
        geometry.for_each_position(&mut |_| count += 1);
        assert_eq!(count, 3);
    }

    #[test]
    fn property_order_is_preserved() {
        let feature: Feature = serde_json::from_value(json!({
            "type": "Feature",
            "geometry": null,
            "properties": { "zeta": 1, "alpha": 2 }
        }))
        .expect("feature");
        let keys: Vec<&String> = feature.properties.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }
}
