//! Rule-based anomaly classification.
//!
//! Each rule is a threshold predicate over one record's kinematic fields. A
//! rule whose inputs are absent does not apply; it never counts as a hit and
//! never fails.

use serde::{Deserialize, Serialize};

use crate::flight::FlightRecord;

/// Altitude above which low speed is suspicious, in meters.
const HIGH_ALTITUDE_M: f64 = 3000.0;

/// Ground speed below which an aircraft at altitude is suspicious, in m/s.
const LOW_SPEED_MPS: f64 = 40.0;

/// Vertical rate magnitude considered rapid, in m/s.
const RAPID_VERTICAL_RATE_MPS: f64 = 15.0;

/// Altitude below which an airborne aircraft is near the ground, in meters.
const NEAR_GROUND_M: f64 = 300.0;

/// Ground speed below which an aircraft is effectively stationary, in m/s.
const STATIONARY_SPEED_MPS: f64 = 5.0;

/// An anomaly rule. Declaration order is the order reasons are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyRule {
    /// Slow at high altitude.
    LowSpeedAtAltitude,
    /// Climbing or descending unusually fast.
    RapidVerticalRate,
    /// Airborne, low and barely moving.
    StationaryNearGround,
}

impl AnomalyRule {
    /// All rules in evaluation order.
    pub const ALL: [Self; 3] = [
        Self::LowSpeedAtAltitude,
        Self::RapidVerticalRate,
        Self::StationaryNearGround,
    ];

    /// Stable identifier used on the wire.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::LowSpeedAtAltitude => "low_speed_at_altitude",
            Self::RapidVerticalRate => "rapid_vertical_rate",
            Self::StationaryNearGround => "stationary_near_ground",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::LowSpeedAtAltitude => "Low speed at high altitude",
            Self::RapidVerticalRate => "Rapid vertical change",
            Self::StationaryNearGround => "Stationary at low altitude",
        }
    }

    /// Evaluate the rule. Returns `false` when a required field is absent.
    #[must_use]
    pub fn fires(self, flight: &FlightRecord) -> bool {
        match self {
            Self::LowSpeedAtAltitude => matches!(
                (flight.altitude, flight.ground_speed),
                (Some(alt), Some(speed)) if alt > HIGH_ALTITUDE_M && speed < LOW_SPEED_MPS
            ),
            Self::RapidVerticalRate => flight
                .vertical_rate
                .is_some_and(|rate| rate.abs() > RAPID_VERTICAL_RATE_MPS),
            Self::StationaryNearGround => {
                !flight.on_ground
                    && matches!(
                        (flight.altitude, flight.ground_speed),
                        (Some(alt), Some(speed))
                            if alt < NEAR_GROUND_M && speed < STATIONARY_SPEED_MPS
                    )
            }
        }
    }
}

impl std::fmt::Display for AnomalyRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Outcome of classifying one flight record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyVerdict {
    /// True iff at least one rule fired.
    pub is_anomalous: bool,

    /// Every rule that fired, in [`AnomalyRule::ALL`] order.
    pub reasons: Vec<AnomalyRule>,
}

impl AnomalyVerdict {
    /// Human-readable summary such as `"Rapid vertical change"`, or `None`
    /// when nothing fired.
    #[must_use]
    pub fn label(&self) -> Option<String> {
        if self.reasons.is_empty() {
            return None;
        }
        Some(
            self.reasons
                .iter()
                .map(|rule| rule.label())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Classify a flight record.
#[must_use]
pub fn classify(flight: &FlightRecord) -> AnomalyVerdict {
    let reasons: Vec<AnomalyRule> = AnomalyRule::ALL
        .into_iter()
        .filter(|rule| rule.fires(flight))
        .collect();

    AnomalyVerdict {
        is_anomalous: !reasons.is_empty(),
        reasons,
    }
}
