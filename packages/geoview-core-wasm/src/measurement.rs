//! Interactive distance, area and bearing measurement.
//!
//! A [`MeasurementSession`] collects clicked positions for one mode at a time and
//! turns them into an immutable [`MeasurementResult`]. Completed results live in
//! a separate [`MeasurementStore`] so removing or clearing them never touches the
//! session that is currently collecting.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::console_warn;
use crate::error::{GeometryError, Result};
use crate::geometry_math;
use crate::models::Position;

const CARDINAL_DIRECTIONS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementMode {
    Distance,
    Area,
    Bearing,
}

impl MeasurementMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementMode::Distance => "distance",
            MeasurementMode::Area => "area",
            MeasurementMode::Bearing => "bearing",
        }
    }
}

impl fmt::Display for MeasurementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasurementMode {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "distance" => Ok(MeasurementMode::Distance),
            "area" => Ok(MeasurementMode::Area),
            "bearing" => Ok(MeasurementMode::Bearing),
            other => Err(GeometryError::InvalidArgument(format!(
                "unknown measurement mode '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementResult {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MeasurementMode,
    pub value: f64,
    pub coordinates: Vec<Position>,
    pub label: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Collecting {
        mode: MeasurementMode,
        points: Vec<Position>,
    },
}

/// Point accumulator for one measurement at a time.
#[derive(Debug, Clone, Default)]
pub struct MeasurementSession {
    state: SessionState,
}

impl MeasurementSession {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn mode(&self) -> Option<MeasurementMode> {
        match &self.state {
            SessionState::Idle => None,
            SessionState::Collecting { mode, .. } => Some(*mode),
        }
    }

    pub fn points(&self) -> &[Position] {
        match &self.state {
            SessionState::Idle => &[],
            SessionState::Collecting { points, .. } => points,
        }
    }

    pub fn is_collecting(&self) -> bool {
        matches!(self.state, SessionState::Collecting { .. })
    }

    /// Begin collecting for `mode`. Points from an unfinished measurement are dropped.
    pub fn start(&mut self, mode: MeasurementMode) {
        self.state = SessionState::Collecting {
            mode,
            points: Vec::new(),
        };
    }

    pub fn add_point(&mut self, position: Position) -> Result<()> {
        let SessionState::Collecting { points, .. } = &mut self.state else {
            return Err(GeometryError::InvalidSession(
                "add_point called with no measurement in progress".to_string(),
            ));
        };
        geometry_math::to_point(&position)?;
        points.push(position);
        Ok(())
    }

    /// Finish the current measurement.
    ///
    /// Returns `None` and keeps collecting when the point count does not fit
    /// the mode (distance ≥ 2, area ≥ 3, bearing exactly 2) or the value
    /// cannot be computed. On success the session goes back to idle.
    pub fn complete(&mut self) -> Option<MeasurementResult> {
        let SessionState::Collecting { mode, points } = &self.state else {
            return None;
        };

        let measured = match mode {
            MeasurementMode::Distance if points.len() >= 2 => {
                geometry_math::path_length(points).map(|meters| (meters, format_distance(meters)))
            }
            MeasurementMode::Area if points.len() >= 3 => {
                geometry_math::area(points).map(|square_meters| (square_meters, format_area(square_meters)))
            }
            MeasurementMode::Bearing if points.len() == 2 => {
                geometry_math::bearing(&points[0], &points[1])
                    .map(|degrees| (degrees, format_bearing(degrees)))
            }
            _ => return None,
        };

        let (value, label) = match measured {
            Ok(measured) => measured,
            Err(err) => {
                console_warn!("Could not complete {} measurement: {}", mode, err);
                return None;
            }
        };

        let SessionState::Collecting { mode, points } = std::mem::take(&mut self.state) else {
            return None;
        };

        Some(MeasurementResult {
            id: format!("{}-{}", mode, Uuid::new_v4()),
            kind: mode,
            value,
            coordinates: points,
            label,
            timestamp: now_millis(),
        })
    }

    /// Discard collected points and return to idle.
    pub fn cancel(&mut self) {
        self.state = SessionState::Idle;
    }
}

/// Completed measurements, in completion order.
#[derive(Debug, Clone, Default)]
pub struct MeasurementStore {
    results: Vec<MeasurementResult>,
}

impl MeasurementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: MeasurementResult) {
        self.results.push(result);
    }

    /// Remove by id; returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.results.len();
        self.results.retain(|result| result.id != id);
        self.results.len() != before
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }

    pub fn as_slice(&self) -> &[MeasurementResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{:.2} m", meters)
    } else if meters < 100_000.0 {
        format!("{:.2} km", meters / 1000.0)
    } else {
        format!("{:.0} km", meters / 1000.0)
    }
}

pub fn format_area(square_meters: f64) -> String {
    if square_meters < 10_000.0 {
        format!("{:.2} m²", square_meters)
    } else if square_meters < 1_000_000.0 {
        format!("{:.2} ha", square_meters / 10_000.0)
    } else {
        format!("{:.2} km²", square_meters / 1_000_000.0)
    }
}

/// `"123.4° (SE)"` on a 16-point compass rose.
pub fn format_bearing(degrees: f64) -> String {
    let index = ((degrees / 22.5).round() as usize) % CARDINAL_DIRECTIONS.len();
    format!("{:.1}° ({})", degrees, CARDINAL_DIRECTIONS[index])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    M,
    Km,
    Mi,
    Ft,
}

impl FromStr for DistanceUnit {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "m" => Ok(DistanceUnit::M),
            "km" => Ok(DistanceUnit::Km),
            "mi" => Ok(DistanceUnit::Mi),
            "ft" => Ok(DistanceUnit::Ft),
            other => Err(GeometryError::InvalidArgument(format!("unknown distance unit '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaUnit {
    M2,
    Km2,
    Ha,
    Ac,
    Mi2,
}

impl FromStr for AreaUnit {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "m2" => Ok(AreaUnit::M2),
            "km2" => Ok(AreaUnit::Km2),
            "ha" => Ok(AreaUnit::Ha),
            "ac" => Ok(AreaUnit::Ac),
            "mi2" => Ok(AreaUnit::Mi2),
            other => Err(GeometryError::InvalidArgument(format!("unknown area unit '{}'", other))),
        }
    }
}

pub fn convert_distance(meters: f64, unit: DistanceUnit) -> f64 {
    match unit {
        DistanceUnit::M => meters,
        DistanceUnit::Km => meters / 1000.0,
        DistanceUnit::Mi => meters / 1609.344,
        DistanceUnit::Ft => meters * 3.28084,
    }
}

pub fn convert_area(square_meters: f64, unit: AreaUnit) -> f64 {
    match unit {
        AreaUnit::M2 => square_meters,
        AreaUnit::Km2 => square_meters / 1_000_000.0,
        AreaUnit::Ha => square_meters / 10_000.0,
        AreaUnit::Ac => square_meters / 4046.86,
        AreaUnit::Mi2 => square_meters / 2_589_988.0,
    }
}

#[cfg(target_arch = "wasm32")]
fn now_millis() -> f64 {
    js_sys::Date::now()
}

#[cfg(not(target_arch = "wasm32"))]
fn now_millis() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as f64)
        .unwrap_or(0.0)
}
