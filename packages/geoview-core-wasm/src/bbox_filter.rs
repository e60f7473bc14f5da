// Envelope checks used to reject features before running full DE-9IM evaluation
use crate::models::{BoundingBox, Feature, Geometry};

// Function to check if a position is inside a bounding box
pub fn point_in_bbox(position: &[f64], bbox: &BoundingBox) -> bool {
    match position {
        [lng, lat, ..] => bbox.contains(*lng, *lat),
        _ => false,
    }
}

// Envelope of a geometry; malformed positions are ignored
pub fn geometry_envelope(geometry: &Geometry) -> Option<BoundingBox> {
    let mut envelope: Option<BoundingBox> = None;
    geometry.for_each_position(&mut |position| {
        if let [lng, lat, ..] = position.as_slice() {
            if !lng.is_finite() || !lat.is_finite() {
                return;
            }
            match envelope.as_mut() {
                Some(bbox) => bbox.extend(*lng, *lat),
                None => envelope = Some(BoundingBox::new(*lng, *lat, *lng, *lat)),
            }
        }
    });
    envelope
}

// Envelope over every feature with a geometry
pub fn features_envelope(features: &[Feature]) -> Option<BoundingBox> {
    features
        .iter()
        .filter_map(|feature| feature.geometry.as_ref())
        .filter_map(geometry_envelope)
        .reduce(|mut acc, bbox| {
            acc.extend(bbox.min_lng, bbox.min_lat);
            acc.extend(bbox.max_lng, bbox.max_lat);
            acc
        })
}

// Quick rejection test: if the envelopes don't overlap, the geometries can't interact.
// Returns true when the pair may still intersect and needs the full predicate.
pub fn envelopes_may_intersect(a: &Geometry, b: &Geometry) -> bool {
    match (geometry_envelope(a), geometry_envelope(b)) {
        (Some(envelope_a), Some(envelope_b)) => envelope_a.intersects(&envelope_b),
        // Unknown envelopes fall through to the full evaluation
        _ => true,
    }
}
