//! Parsing of raw snapshot payloads.
//!
//! The ingestion job has written two shapes over time. The current one is the
//! serialized [`RegionSnapshot`]. The older one is a root object holding a
//! `timestamp` and a `snapshot` list of OpenSky state vectors, sometimes
//! wrapped in a one-element root list. Both end up as a validated
//! [`RegionSnapshot`] or a [`Error::MalformedSnapshot`].

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::flight::{FlightRecord, RegionSnapshot, SNAPSHOT_FORMAT_VERSION};

/// A timestamp as ingestion jobs write it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Seconds(i64),
    FractionalSeconds(f64),
    Text(String),
}

impl RawTimestamp {
    fn resolve(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Seconds(secs) => Utc.timestamp_opt(*secs, 0).single(),
            #[allow(clippy::cast_possible_truncation)]
            Self::FractionalSeconds(secs) => {
                let whole = secs.trunc() as i64;
                let nanos = ((secs - secs.trunc()) * 1e9) as u32;
                Utc.timestamp_opt(whole, nanos).single()
            }
            Self::Text(text) => DateTime::parse_from_rfc3339(text.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// A flight record before validation. Accepts both field vocabularies.
#[derive(Debug, Deserialize)]
struct RawFlight {
    icao24: Option<String>,
    callsign: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude: Option<f64>,
    geo_altitude: Option<f64>,
    baro_altitude: Option<f64>,
    ground_speed: Option<f64>,
    velocity: Option<f64>,
    vertical_rate: Option<f64>,
    on_ground: Option<bool>,
    last_contact: Option<RawTimestamp>,
}

impl RawFlight {
    fn into_record(
        self,
        origin: &str,
        index: usize,
        captured_at: DateTime<Utc>,
    ) -> Result<FlightRecord> {
        let icao24 = self
            .icao24
            .map(|id| id.trim().to_ascii_lowercase())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::malformed(origin, format!("record {index} has no icao24")))?;

        let on_ground = self.on_ground.ok_or_else(|| {
            Error::malformed(origin, format!("record {index} ({icao24}) has no on_ground"))
        })?;

        let last_contact = match self.last_contact {
            Some(raw) => raw.resolve().ok_or_else(|| {
                Error::malformed(
                    origin,
                    format!("record {index} ({icao24}) has an unreadable last_contact"),
                )
            })?,
            None => captured_at,
        };

        Ok(FlightRecord {
            icao24,
            callsign: self.callsign.unwrap_or_default(),
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude.or(self.geo_altitude).or(self.baro_altitude),
            ground_speed: self.ground_speed.or(self.velocity),
            vertical_rate: self.vertical_rate,
            on_ground,
            last_contact,
        })
    }
}

/// Parse a raw payload for `region_id`.
///
/// # Errors
///
/// Returns [`Error::MalformedSnapshot`] if the payload is empty, truncated,
/// has neither a `flights` nor a `snapshot` list, names a different region,
/// declares an unsupported version, or contains an invalid record.
pub fn parse_snapshot(region_id: &str, bytes: &[u8]) -> Result<RegionSnapshot> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::malformed(region_id, "payload is empty (partial write?)"));
    }

    let root: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::malformed(region_id, format!("invalid JSON: {e}")))?;

    let object = unwrap_root(region_id, root)?;

    if let Some(declared) = object.get("region_id").and_then(Value::as_str) {
        if declared != region_id {
            return Err(Error::malformed(
                region_id,
                format!("payload is for region '{declared}'"),
            ));
        }
    }

    let version = match object.get("version") {
        None | Some(Value::Null) => SNAPSHOT_FORMAT_VERSION,
        Some(value) => value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| Error::malformed(region_id, "version is not a small integer"))?,
    };

    let captured_at = match object.get("captured_at").or_else(|| object.get("timestamp")) {
        None | Some(Value::Null) => {
            warn!(region = %region_id, "Snapshot has no capture time; using ingestion time");
            Utc::now()
        }
        Some(value) => serde_json::from_value::<RawTimestamp>(value.clone())
            .ok()
            .and_then(|raw| raw.resolve())
            .ok_or_else(|| Error::malformed(region_id, "capture time is unreadable"))?,
    };

    let raw_flights = match object.get("flights").or_else(|| object.get("snapshot")) {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(Error::malformed(region_id, "flight list is not an array"));
        }
        None => {
            return Err(Error::malformed(
                region_id,
                "payload has neither 'flights' nor 'snapshot'",
            ));
        }
    };

    let mut flights = Vec::with_capacity(raw_flights.len());
    for (index, item) in raw_flights.iter().enumerate() {
        let raw: RawFlight = serde_json::from_value(item.clone())
            .map_err(|e| Error::malformed(region_id, format!("record {index}: {e}")))?;
        flights.push(raw.into_record(region_id, index, captured_at)?);
    }

    let snapshot = RegionSnapshot {
        version,
        region_id: region_id.to_string(),
        captured_at,
        flights,
    };
    snapshot.validate()?;

    debug!(
        region = %region_id,
        flights = snapshot.len(),
        captured_at = %snapshot.captured_at,
        "Parsed snapshot payload"
    );
    Ok(snapshot)
}

/// Accept a root object, or a root list whose first element is the object.
fn unwrap_root(region_id: &str, root: Value) -> Result<Map<String, Value>> {
    match root {
        Value::Object(object) => Ok(object),
        Value::Array(items) => match items.into_iter().next() {
            Some(Value::Object(object)) => Ok(object),
            _ => Err(Error::malformed(
                region_id,
                "root list does not start with a snapshot object",
            )),
        },
        _ => Err(Error::malformed(region_id, "root is not an object")),
    }
}
