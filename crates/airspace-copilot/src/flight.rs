//! Core flight types for airspace-copilot.
//!
//! This module defines the flight records and region snapshots that the
//! ingestion job writes and every other component reads.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::anomaly::AnomalyVerdict;
use crate::error::{Error, Result};

/// Current version of the on-disk snapshot format.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// One aircraft's state at snapshot time.
///
/// Every kinematic field is optional: a ground station may know an aircraft
/// without having a position fix for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    /// Unique hardware address (hex, lower-case).
    pub icao24: String,

    /// Human-facing identifier. May be blank or padded with spaces.
    #[serde(default)]
    pub callsign: String,

    /// Latitude in degrees.
    pub latitude: Option<f64>,

    /// Longitude in degrees.
    pub longitude: Option<f64>,

    /// Altitude in meters.
    pub altitude: Option<f64>,

    /// Ground speed in meters per second.
    pub ground_speed: Option<f64>,

    /// Vertical rate in meters per second, positive when climbing.
    pub vertical_rate: Option<f64>,

    /// Whether the transponder reports the aircraft on the ground.
    pub on_ground: bool,

    /// Time of the last message received from the aircraft.
    pub last_contact: DateTime<Utc>,
}

impl FlightRecord {
    /// Create a record with only the identity fields set.
    #[must_use]
    pub fn new(icao24: impl Into<String>, callsign: impl Into<String>) -> Self {
        Self {
            icao24: icao24.into(),
            callsign: callsign.into(),
            latitude: None,
            longitude: None,
            altitude: None,
            ground_speed: None,
            vertical_rate: None,
            on_ground: false,
            last_contact: Utc::now(),
        }
    }

    /// The identifier to show people: the trimmed callsign, or the ICAO24
    /// address when the callsign is blank.
    #[must_use]
    pub fn display_id(&self) -> &str {
        let callsign = self.callsign.trim();
        if callsign.is_empty() {
            &self.icao24
        } else {
            callsign
        }
    }

    /// Check if the record carries a position fix.
    #[must_use]
    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// A flight record together with its anomaly verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedFlight {
    /// The record as stored in the snapshot.
    #[serde(flatten)]
    pub flight: FlightRecord,

    /// Verdict computed from the record.
    pub verdict: AnomalyVerdict,
}

impl AnnotatedFlight {
    /// Classify a record and pair it with its verdict.
    #[must_use]
    pub fn classify(flight: FlightRecord) -> Self {
        let verdict = crate::anomaly::classify(&flight);
        Self { flight, verdict }
    }
}

/// All flights of one region captured at one ingestion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    /// Format version the snapshot was written with.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Region this snapshot belongs to.
    pub region_id: String,

    /// When the ingestion job captured the data.
    pub captured_at: DateTime<Utc>,

    /// Flights in ingestion order.
    #[serde(default)]
    pub flights: Vec<FlightRecord>,
}

fn default_version() -> u32 {
    SNAPSHOT_FORMAT_VERSION
}

impl RegionSnapshot {
    /// Create a snapshot at the current format version.
    #[must_use]
    pub fn new(
        region_id: impl Into<String>,
        captured_at: DateTime<Utc>,
        flights: Vec<FlightRecord>,
    ) -> Self {
        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            region_id: region_id.into(),
            captured_at,
            flights,
        }
    }

    /// Number of flights in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    /// Check if the region currently has no traffic.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    /// Validate the shape invariants the rest of the crate relies on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSnapshot`] if the region id is invalid, the
    /// version is unknown, or an `icao24` is blank or repeated.
    pub fn validate(&self) -> Result<()> {
        validate_region_id(&self.region_id)?;

        if self.version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::malformed(
                &self.region_id,
                format!(
                    "format version {} is newer than supported version {SNAPSHOT_FORMAT_VERSION}",
                    self.version
                ),
            ));
        }

        let mut seen = HashSet::with_capacity(self.flights.len());
        for (index, flight) in self.flights.iter().enumerate() {
            if flight.icao24.trim().is_empty() {
                return Err(Error::malformed(
                    &self.region_id,
                    format!("record {index} has no icao24"),
                ));
            }
            if !seen.insert(flight.icao24.as_str()) {
                return Err(Error::malformed(
                    &self.region_id,
                    format!("record {index} repeats icao24 '{}'", flight.icao24),
                ));
            }
        }

        Ok(())
    }
}

/// Check that a region id is usable as a file stem.
///
/// # Errors
///
/// Returns [`Error::MalformedSnapshot`] if the id is empty or contains
/// anything other than ASCII alphanumerics, `-` and `_`.
pub fn validate_region_id(region_id: &str) -> Result<()> {
    if region_id.is_empty() {
        return Err(Error::malformed("<unnamed>", "region id is empty"));
    }
    if !region_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::malformed(
            region_id,
            "region id may only contain ASCII letters, digits, '-' and '_'",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flight(icao24: &str, callsign: &str) -> FlightRecord {
        FlightRecord::new(icao24, callsign)
    }

    #[test]
    fn test_display_id_prefers_callsign() {
        let record = flight("4baa1a", "THY4KZ  ");
        assert_eq!(record.display_id(), "THY4KZ");
    }

    #[test]
    fn test_display_id_falls_back_to_icao24() {
        let record = flight("4baa1a", "   ");
        assert_eq!(record.display_id(), "4baa1a");
    }

    #[test]
    fn test_record_without_position() {
        let record = flight("abc123", "");
        assert!(!record.has_position());
        assert!(record.altitude.is_none());
    }

    #[test]
    fn test_validate_accepts_empty_region() {
        let snapshot = RegionSnapshot::new("region1", Utc::now(), Vec::new());
        assert!(snapshot.validate().is_ok());
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_validate_rejects_blank_icao24() {
        let snapshot = RegionSnapshot::new("region1", Utc::now(), vec![flight(" ", "THY4KZ")]);
        let err = snapshot.validate().unwrap_err();
        assert!(err.to_string().contains("record 0 has no icao24"));
    }

    #[test]
    fn test_validate_rejects_duplicate_icao24() {
        let snapshot = RegionSnapshot::new(
            "region1",
            Utc::now(),
            vec![flight("4baa1a", "THY4KZ"), flight("4baa1a", "THY9")],
        );
        let err = snapshot.validate().unwrap_err();
        assert!(err.to_string().contains("repeats icao24"));
    }

    #[test]
    fn test_validate_rejects_newer_version() {
        let mut snapshot = RegionSnapshot::new("region1", Utc::now(), Vec::new());
        snapshot.version = SNAPSHOT_FORMAT_VERSION + 1;
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn test_validate_region_id() {
        assert!(validate_region_id("region1").is_ok());
        assert!(validate_region_id("eu-west_2").is_ok());
        assert!(validate_region_id("").is_err());
        assert!(validate_region_id("../etc").is_err());
        assert!(validate_region_id("region 1").is_err());
    }

    #[test]
    fn test_annotated_flight_serializes_flat() {
        let annotated = AnnotatedFlight::classify(flight("4baa1a", "THY4KZ"));
        let json = serde_json::to_value(&annotated).unwrap();
        assert_eq!(json["icao24"], "4baa1a");
        assert_eq!(json["verdict"]["is_anomalous"], false);
        assert!(json["altitude"].is_null());
    }

    #[test]
    fn test_snapshot_version_defaults_when_missing() {
        let json = r#"{"region_id":"region1","captured_at":"2026-01-01T00:00:00Z","flights":[]}"#;
        let snapshot: RegionSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.version, SNAPSHOT_FORMAT_VERSION);
    }
}
