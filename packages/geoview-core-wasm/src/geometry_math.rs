//! Spherical-earth geometry primitives and DE-9IM predicates.
//!
//! Distances and bearings use the haversine model (mean radius 6 371 008.8 m),
//! areas use the Chamberlain–Duquette spherical approximation. Everything here
//! is a pure function over the GeoJSON model in [`crate::models`]; conversions to
//! `geo` types happen at the edges of each call.

use geo::algorithm::buffer::Buffer;
use geo::algorithm::dimensions::{Dimensions, HasDimensions};
use geo::algorithm::line_measures::metric_spaces::Haversine;
use geo::algorithm::line_measures::{Bearing, Distance};
use geo::algorithm::relate::IntersectionMatrix;
use geo::{BooleanOps, Centroid, ChamberlainDuquetteArea, ConvexHull, Relate};
use geo_types::{Coord, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};

use crate::bbox_filter;
use crate::error::{GeometryError, Result};
use crate::models::{BoundingBox, Feature, Geometry, Position};

/// Kilometres spanned by one degree of latitude.
pub const KM_PER_DEGREE: f64 = 111.32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpatialRelation {
    Intersects,
    Contains,
    Within,
    Overlaps,
    Touches,
    Crosses,
    Disjoint,
}

pub(crate) fn to_point(position: &[f64]) -> Result<Point<f64>> {
    match position {
        [lng, lat, ..] if lng.is_finite() && lat.is_finite() => Ok(Point::new(*lng, *lat)),
        _ => Err(GeometryError::InvalidPosition(format!("{:?}", position))),
    }
}

fn to_coord(position: &[f64]) -> Result<Coord<f64>> {
    to_point(position).map(|point| point.0)
}

fn to_line_string(positions: &[Position], min_points: usize) -> Result<LineString<f64>> {
    if positions.len() < min_points {
        return Err(GeometryError::TooFewPoints {
            operation: "line",
            required: min_points,
            actual: positions.len(),
        });
    }
    positions
        .iter()
        .map(|position| to_coord(position))
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}

fn to_polygon(rings: &[Vec<Position>]) -> Result<Polygon<f64>> {
    let (exterior, interiors) = rings.split_first().ok_or(GeometryError::EmptyGeometry)?;
    // geo closes open rings on construction
    let exterior = to_line_string(exterior, 3)?;
    let interiors = interiors
        .iter()
        .map(|ring| to_line_string(ring, 3))
        .collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

/// Convert a GeoJSON geometry into its `geo` equivalent.
///
/// Fails on malformed positions, rings with fewer than 3 positions, lines with
/// fewer than 2 and geometries without any coordinates.
pub fn to_geo(geometry: &Geometry) -> Result<geo::Geometry<f64>> {
    let converted = match geometry {
        Geometry::Point { coordinates } => geo::Geometry::Point(to_point(coordinates)?),
        Geometry::MultiPoint { coordinates } => geo::Geometry::MultiPoint(MultiPoint::new(
            coordinates
                .iter()
                .map(|position| to_point(position))
                .collect::<Result<Vec<_>>>()?,
        )),
        Geometry::LineString { coordinates } => {
            geo::Geometry::LineString(to_line_string(coordinates, 2)?)
        }
        Geometry::MultiLineString { coordinates } => {
            geo::Geometry::MultiLineString(MultiLineString::new(
                coordinates
                    .iter()
                    .map(|line| to_line_string(line, 2))
                    .collect::<Result<Vec<_>>>()?,
            ))
        }
        Geometry::Polygon { coordinates } => geo::Geometry::Polygon(to_polygon(coordinates)?),
        Geometry::MultiPolygon { coordinates } => geo::Geometry::MultiPolygon(MultiPolygon::new(
            coordinates
                .iter()
                .map(|polygon| to_polygon(polygon))
                .collect::<Result<Vec<_>>>()?,
        )),
        Geometry::GeometryCollection { geometries } => {
            geo::Geometry::GeometryCollection(geo::GeometryCollection::new_from(
                geometries.iter().map(to_geo).collect::<Result<Vec<_>>>()?,
            ))
        }
    };

    if converted.is_empty() {
        return Err(GeometryError::EmptyGeometry);
    }
    Ok(converted)
}

fn ring_positions(ring: &LineString<f64>) -> Vec<Position> {
    ring.coords().map(|c| vec![c.x, c.y]).collect()
}

fn polygon_rings(polygon: &Polygon<f64>) -> Vec<Vec<Position>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors().iter())
        .map(ring_positions)
        .collect()
}

/// GeoJSON geometry for a polygonal `geo` result; a single polygon collapses
/// to `Polygon`, an empty result yields `None`.
pub fn from_geo_multipolygon(multi: &MultiPolygon<f64>) -> Option<Geometry> {
    match multi.0.as_slice() {
        [] => None,
        [polygon] => Some(Geometry::Polygon {
            coordinates: polygon_rings(polygon),
        }),
        polygons => Some(Geometry::MultiPolygon {
            coordinates: polygons.iter().map(polygon_rings).collect(),
        }),
    }
}

pub(crate) fn to_multipolygon(geometry: &Geometry) -> Result<MultiPolygon<f64>> {
    match to_geo(geometry)? {
        geo::Geometry::Polygon(polygon) => Ok(MultiPolygon::new(vec![polygon])),
        geo::Geometry::MultiPolygon(multi) => Ok(multi),
        _ => Err(GeometryError::UnsupportedGeometry(
            geometry.geometry_type().to_string(),
        )),
    }
}

/// Great-circle distance in meters.
pub fn distance(a: &[f64], b: &[f64]) -> Result<f64> {
    Ok(Haversine.distance(to_point(a)?, to_point(b)?))
}

/// Initial bearing from `a` to `b` in degrees, normalised to `[0, 360)`.
pub fn bearing(a: &[f64], b: &[f64]) -> Result<f64> {
    let (from, to) = (to_point(a)?, to_point(b)?);
    if from == to {
        return Err(GeometryError::DegenerateBearing);
    }
    let raw = Haversine.bearing(from, to);
    let normalised = if raw < 0.0 { raw + 360.0 } else { raw };
    Ok(if normalised >= 360.0 { normalised - 360.0 } else { normalised })
}

/// Spherical area of a single ring in square meters. Open rings are closed first.
pub fn area(ring: &[Position]) -> Result<f64> {
    if ring.len() < 3 {
        return Err(GeometryError::TooFewPoints {
            operation: "area",
            required: 3,
            actual: ring.len(),
        });
    }

    let mut coords = ring
        .iter()
        .map(|position| to_coord(position))
        .collect::<Result<Vec<_>>>()?;
    if coords.first() != coords.last() {
        coords.push(coords[0]);
    }

    Ok(Polygon::new(LineString::new(coords), vec![]).chamberlain_duquette_unsigned_area())
}

/// Length of a path in meters. With 3 or more points the loop is closed back to the start.
pub fn perimeter(points: &[Position]) -> Result<f64> {
    if points.len() < 2 {
        return Err(GeometryError::TooFewPoints {
            operation: "perimeter",
            required: 2,
            actual: points.len(),
        });
    }

    let mut total = path_length(points)?;
    if points.len() > 2 {
        total += distance(&points[points.len() - 1], &points[0])?;
    }
    Ok(total)
}

/// Sum of consecutive segment distances in meters.
pub fn path_length(points: &[Position]) -> Result<f64> {
    points
        .windows(2)
        .map(|pair| distance(&pair[0], &pair[1]))
        .sum()
}

/// Area in square meters of a polygonal geometry (holes subtracted); zero for other types.
pub fn geometry_area(geometry: &Geometry) -> Result<f64> {
    match to_geo(geometry)? {
        geo::Geometry::Polygon(polygon) => Ok(polygon.chamberlain_duquette_unsigned_area()),
        geo::Geometry::MultiPolygon(multi) => Ok(multi.chamberlain_duquette_unsigned_area()),
        _ => Ok(0.0),
    }
}

/// Great-circle length in meters of a linear geometry; zero for other types.
pub fn geometry_length(geometry: &Geometry) -> Result<f64> {
    match geometry {
        Geometry::LineString { coordinates } => {
            to_line_string(coordinates, 2)?;
            path_length(coordinates)
        }
        Geometry::MultiLineString { coordinates } => coordinates
            .iter()
            .map(|line| {
                to_line_string(line, 2)?;
                path_length(line)
            })
            .sum(),
        _ => Ok(0.0),
    }
}

/// Min/max longitude and latitude across every coordinate of every feature.
///
/// An input without any usable coordinate is an [`GeometryError::EmptyGeometry`];
/// callers decide what to substitute.
pub fn bounding_box(features: &[Feature]) -> Result<BoundingBox> {
    bbox_filter::features_envelope(features).ok_or(GeometryError::EmptyGeometry)
}

/// Representative centre of a feature. Points return themselves; other
/// geometries use the area/length weighted centroid.
pub fn centroid(feature: &Feature) -> Result<Position> {
    let geometry = feature.geometry.as_ref().ok_or(GeometryError::EmptyGeometry)?;
    if let Geometry::Point { coordinates } = geometry {
        let point = to_point(coordinates)?;
        return Ok(vec![point.x(), point.y()]);
    }

    to_geo(geometry)?
        .centroid()
        .map(|point| vec![point.x(), point.y()])
        .ok_or(GeometryError::EmptyGeometry)
}

/// Buffer a geometry outward by `meters`.
///
/// The buffering primitive is planar, so the distance goes meters → kilometres →
/// degrees at [`KM_PER_DEGREE`].
pub fn buffer(geometry: &Geometry, meters: f64) -> Option<Geometry> {
    if !meters.is_finite() || meters <= 0.0 {
        return None;
    }
    let kilometres = meters / 1000.0;
    let degrees = kilometres / KM_PER_DEGREE;

    let source = to_geo(geometry).ok()?;
    let buffered = source.buffer(degrees);
    from_geo_multipolygon(&buffered)
}

/// Circular region of `meters` around a position.
pub fn buffer_point(position: &[f64], meters: f64) -> Option<Feature> {
    let point = to_point(position).ok()?;
    buffer(
        &Geometry::Point {
            coordinates: vec![point.x(), point.y()],
        },
        meters,
    )
    .map(Feature::new)
}

/// Smallest convex polygon around every feature with a geometry.
pub fn convex_hull(features: &[Feature]) -> Option<Feature> {
    let points: Vec<Point<f64>> = features
        .iter()
        .filter_map(|feature| feature.geometry.as_ref())
        .flat_map(|geometry| geometry.positions())
        .filter_map(|position| to_point(position).ok())
        .collect();

    if points.is_empty() {
        return None;
    }

    let hull = MultiPoint::new(points).convex_hull();
    from_geo_multipolygon(&MultiPolygon::new(vec![hull])).map(Feature::new)
}

pub(crate) fn union_polygons(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    a.union(b)
}

pub(crate) fn intersect_polygons(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    a.intersection(b)
}

pub(crate) fn subtract_polygons(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    a.difference(b)
}

fn dimension_rank(geometry: &geo::Geometry<f64>) -> u8 {
    match geometry.dimensions() {
        Dimensions::Empty => 0,
        Dimensions::ZeroDimensional => 1,
        Dimensions::OneDimensional => 2,
        Dimensions::TwoDimensional => 3,
    }
}

/// Evaluate a relation between two already converted geometries.
/// Patterns that cannot be evaluated count as `false`.
pub(crate) fn relate_geo(
    a: &geo::Geometry<f64>,
    b: &geo::Geometry<f64>,
    relation: SpatialRelation,
) -> bool {
    let matrix = a.relate(b);
    match relation {
        SpatialRelation::Intersects => matrix.is_intersects(),
        SpatialRelation::Disjoint => matrix.is_disjoint(),
        SpatialRelation::Contains => matrix.is_contains(),
        SpatialRelation::Within => matrix.is_within(),
        SpatialRelation::Overlaps => overlaps_matrix(&matrix, a, b),
        SpatialRelation::Crosses => crosses_matrix(&matrix, a, b),
        SpatialRelation::Touches => {
            matrix.is_intersects() && !overlaps_matrix(&matrix, a, b)
        }
    }
}

fn overlaps_matrix(
    matrix: &IntersectionMatrix,
    a: &geo::Geometry<f64>,
    b: &geo::Geometry<f64>,
) -> bool {
    let (dim_a, dim_b) = (dimension_rank(a), dimension_rank(b));
    if dim_a != dim_b {
        return false;
    }
    let pattern = if dim_a == 2 { "1*T***T**" } else { "T*T***T**" };
    matrix.matches(pattern).unwrap_or(false)
}

fn crosses_matrix(
    matrix: &IntersectionMatrix,
    a: &geo::Geometry<f64>,
    b: &geo::Geometry<f64>,
) -> bool {
    let (dim_a, dim_b) = (dimension_rank(a), dimension_rank(b));
    let pattern = if dim_a == 2 && dim_b == 2 {
        "0********"
    } else if dim_a < dim_b {
        "T*T******"
    } else if dim_a > dim_b {
        "T*****T**"
    } else {
        return false;
    };
    matrix.matches(pattern).unwrap_or(false)
}

/// Evaluate `relation(a, b)`. Malformed or empty geometries yield `false`.
pub fn relate(a: &Geometry, b: &Geometry, relation: SpatialRelation) -> bool {
    if !bbox_filter::envelopes_may_intersect(a, b) {
        return relation == SpatialRelation::Disjoint && to_geo(a).is_ok() && to_geo(b).is_ok();
    }
    match (to_geo(a), to_geo(b)) {
        (Ok(a), Ok(b)) => relate_geo(&a, &b, relation),
        _ => false,
    }
}

pub fn intersects(a: &Geometry, b: &Geometry) -> bool {
    relate(a, b, SpatialRelation::Intersects)
}

/// True when `a` contains `b`.
pub fn contains(a: &Geometry, b: &Geometry) -> bool {
    relate(a, b, SpatialRelation::Contains)
}

/// True when `a` lies within `b`.
pub fn within(a: &Geometry, b: &Geometry) -> bool {
    relate(a, b, SpatialRelation::Within)
}

pub fn overlaps(a: &Geometry, b: &Geometry) -> bool {
    relate(a, b, SpatialRelation::Overlaps)
}

pub fn crosses(a: &Geometry, b: &Geometry) -> bool {
    relate(a, b, SpatialRelation::Crosses)
}

pub fn disjoint(a: &Geometry, b: &Geometry) -> bool {
    relate(a, b, SpatialRelation::Disjoint)
}

/// Boundary contact approximated as "intersects and does not overlap".
pub fn touches(a: &Geometry, b: &Geometry) -> bool {
    relate(a, b, SpatialRelation::Touches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lng: f64, lat: f64) -> Position {
        vec![lng, lat]
    }

    fn square(min: f64, max: f64) -> Geometry {
        Geometry::Polygon {
            coordinates: vec![vec![
                p(min, min),
                p(max, min),
                p(max, max),
                p(min, max),
                p(min, min),
            ]],
        }
    }

    fn point(lng: f64, lat: f64) -> Geometry {
        Geometry::Point {
            coordinates: p(lng, lat),
        }
    }

    #[test]
    fn one_degree_of_longitude_at_equator() {
        let d = distance(&p(0.0, 0.0), &p(1.0, 0.0)).unwrap();
        assert!((d - 111_195.08).abs() < 1.0, "got {d}");
    }

    #[test]
    fn bearing_is_normalised() {
        let west = bearing(&p(0.0, 0.0), &p(-1.0, 0.0)).unwrap();
        assert!((west - 270.0).abs() < 1e-6, "got {west}");
        let north = bearing(&p(0.0, 0.0), &p(0.0, 1.0)).unwrap();
        assert!(north.abs() < 1e-6);
        for target in [p(1.0, -1.0), p(-1.0, -1.0), p(-3.0, 2.0), p(120.0, 45.0)] {
            let b = bearing(&p(0.0, 0.0), &target).unwrap();
            assert!((0.0..360.0).contains(&b), "bearing {b} out of range");
        }
    }

    #[test]
    fn bearing_between_identical_points_is_rejected() {
        assert!(matches!(
            bearing(&p(3.0, 4.0), &p(3.0, 4.0)),
            Err(GeometryError::DegenerateBearing)
        ));
    }

    #[test]
    fn unit_square_area_matches_reference() {
        let ring = vec![p(0.0, 0.0), p(0.0, 1.0), p(1.0, 1.0), p(1.0, 0.0), p(0.0, 0.0)];
        let a = area(&ring).unwrap();
        // ~12 391 km² on the equatorial-radius sphere
        assert!((a - 1.2391e10).abs() / 1.2391e10 < 0.005, "got {a}");
    }

    #[test]
    fn open_ring_equals_closed_ring() {
        let open = vec![p(0.0, 0.0), p(0.0, 1.0), p(1.0, 1.0), p(1.0, 0.0)];
        let mut closed = open.clone();
        closed.push(p(0.0, 0.0));
        let a = area(&open).unwrap();
        let b = area(&closed).unwrap();
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn area_requires_three_points() {
        let err = area(&[p(0.0, 0.0), p(1.0, 1.0)]).unwrap_err();
        assert!(matches!(
            err,
            GeometryError::TooFewPoints {
                required: 3,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn perimeter_closes_the_loop() {
        let segment = perimeter(&[p(0.0, 0.0), p(1.0, 0.0)]).unwrap();
        let leg = distance(&p(0.0, 0.0), &p(1.0, 0.0)).unwrap();
        assert!((segment - leg).abs() < 1e-9);

        let triangle = [p(0.0, 0.0), p(1.0, 0.0), p(0.0, 1.0)];
        let expected = distance(&triangle[0], &triangle[1]).unwrap()
            + distance(&triangle[1], &triangle[2]).unwrap()
            + distance(&triangle[2], &triangle[0]).unwrap();
        assert!((perimeter(&triangle).unwrap() - expected).abs() < 1e-9);

        assert!(perimeter(&[p(0.0, 0.0)]).is_err());
    }

    #[test]
    fn bounding_box_of_empty_input_is_an_error() {
        assert!(matches!(bounding_box(&[]), Err(GeometryError::EmptyGeometry)));
        let features = vec![Feature::new(square(-1.0, 2.0)), Feature::new(point(5.0, -3.0))];
        assert_eq!(
            bounding_box(&features).unwrap(),
            BoundingBox::new(-1.0, -3.0, 5.0, 2.0)
        );
    }

    #[test]
    fn centroid_of_point_is_itself() {
        let c = centroid(&Feature::new(point(7.5, -2.0))).unwrap();
        assert_eq!(c, p(7.5, -2.0));
        let c = centroid(&Feature::new(square(0.0, 2.0))).unwrap();
        assert!((c[0] - 1.0).abs() < 1e-9 && (c[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn predicates_follow_de9im() {
        let big = square(0.0, 10.0);
        let small = square(2.0, 4.0);
        let shifted = square(5.0, 15.0);
        let adjacent = square(10.0, 20.0);
        let far = square(50.0, 60.0);

        assert!(contains(&big, &small));
        assert!(within(&small, &big));
        assert!(!within(&big, &small));
        assert!(overlaps(&big, &shifted));
        assert!(!overlaps(&big, &small));
        assert!(intersects(&big, &adjacent));
        assert!(touches(&big, &adjacent));
        assert!(!touches(&big, &shifted));
        assert!(disjoint(&big, &far));
        assert!(!intersects(&big, &far));

        let line = Geometry::LineString {
            coordinates: vec![p(-5.0, 5.0), p(5.0, 5.0)],
        };
        assert!(crosses(&line, &big));
        assert!(!crosses(&big, &far));
    }

    #[test]
    fn malformed_geometry_never_satisfies_a_predicate() {
        let broken = Geometry::LineString {
            coordinates: vec![vec![1.0]],
        };
        let good = square(0.0, 10.0);
        for relation in [
            SpatialRelation::Intersects,
            SpatialRelation::Contains,
            SpatialRelation::Within,
            SpatialRelation::Overlaps,
            SpatialRelation::Touches,
            SpatialRelation::Crosses,
            SpatialRelation::Disjoint,
        ] {
            assert!(!relate(&broken, &good, relation), "{relation:?}");
        }
    }

    #[test]
    fn buffered_point_covers_nearby_point() {
        let region = buffer(&point(0.0, 0.0), 1_000.0).expect("buffer");
        assert!(matches!(region, Geometry::Polygon { .. }));
        assert!(intersects(&point(0.005, 0.0), &region));
        assert!(!intersects(&point(0.05, 0.0), &region));
        assert!(buffer(&point(0.0, 0.0), 0.0).is_none());
        assert!(buffer_point(&[0.0, 0.0], 500.0).is_some());
    }

    #[test]
    fn geometry_measures() {
        let line = Geometry::LineString {
            coordinates: vec![p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0)],
        };
        let length = geometry_length(&line).unwrap();
        assert!((length - 2.0 * 111_195.08).abs() < 2.0);
        assert_eq!(geometry_area(&line).unwrap(), 0.0);
        assert!(geometry_area(&square(0.0, 1.0)).unwrap() > 1.2e10);
    }

    #[test]
    fn convex_hull_wraps_all_points() {
        let features = vec![
            Feature::new(point(0.0, 0.0)),
            Feature::new(point(4.0, 0.0)),
            Feature::new(point(2.0, 3.0)),
            Feature::new(point(2.0, 1.0)),
        ];
        let hull = convex_hull(&features).expect("hull");
        let inner = hull.geometry.expect("geometry");
        assert!(contains(&inner, &point(2.0, 1.0)));
        assert!(convex_hull(&[]).is_none());
    }
}
