//! Flight query tools.
//!
//! Three read-only operations over the snapshot store, each one store read
//! followed by a pure projection. Results are annotated with anomaly verdicts
//! and keep ingestion order, so repeated calls against the same snapshot
//! return identical output.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::flight::{AnnotatedFlight, FlightRecord, RegionSnapshot};
use crate::store::SnapshotSource;

/// Default bound on a single snapshot read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Annotated flights of one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionView {
    /// Region the flights belong to.
    pub region_id: String,
    /// Capture time of the snapshot the view was built from.
    pub captured_at: DateTime<Utc>,
    /// Flights in ingestion order.
    pub flights: Vec<AnnotatedFlight>,
}

impl RegionView {
    fn from_snapshot(snapshot: &RegionSnapshot) -> Self {
        Self {
            region_id: snapshot.region_id.clone(),
            captured_at: snapshot.captured_at,
            flights: snapshot
                .flights
                .iter()
                .cloned()
                .map(AnnotatedFlight::classify)
                .collect(),
        }
    }

    /// Flights with at least one anomaly reason.
    pub fn anomalous(&self) -> impl Iterator<Item = &AnnotatedFlight> {
        self.flights.iter().filter(|f| f.verdict.is_anomalous)
    }
}

/// The query tool layer.
#[derive(Debug, Clone)]
pub struct FlightQueryService {
    source: Arc<dyn SnapshotSource>,
    read_timeout: Duration,
}

impl FlightQueryService {
    /// Create a query service over a snapshot source.
    #[must_use]
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self {
            source,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Set the bound on each snapshot read.
    #[must_use]
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// All flights of a region, each with its verdict.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegionNotFound`] for an unknown region and
    /// [`Error::UpstreamTimeout`] if the read exceeds the timeout.
    pub async fn list_region_snapshot(&self, region_id: &str) -> Result<RegionView> {
        let snapshot = self.snapshot(region_id).await?;
        Ok(RegionView::from_snapshot(&snapshot))
    }

    /// Find one flight by callsign, falling back to its ICAO24 address.
    ///
    /// Matching runs in three passes over the snapshot, each in ingestion
    /// order: exact case-insensitive callsign, whitespace-free upper-cased
    /// callsign, then ICAO24.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FlightNotFound`] if nothing matches, plus the errors of
    /// [`Self::list_region_snapshot`].
    pub async fn get_by_callsign(&self, region_id: &str, query: &str) -> Result<AnnotatedFlight> {
        let snapshot = self.snapshot(region_id).await?;

        let found = find_flight(&snapshot.flights, query).ok_or_else(|| Error::FlightNotFound {
            region_id: region_id.to_string(),
            query: query.trim().to_string(),
        })?;

        debug!(region = %region_id, query = %query, icao24 = %found.icao24, "Flight matched");
        Ok(AnnotatedFlight::classify(found.clone()))
    }

    /// Flights of a region that are currently anomalous, in the same order as
    /// [`Self::list_region_snapshot`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::list_region_snapshot`].
    pub async fn list_active_alerts(&self, region_id: &str) -> Result<RegionView> {
        let mut view = self.list_region_snapshot(region_id).await?;
        view.flights.retain(|f| f.verdict.is_anomalous);
        Ok(view)
    }

    async fn snapshot(&self, region_id: &str) -> Result<Arc<RegionSnapshot>> {
        tokio::time::timeout(self.read_timeout, self.source.get_snapshot(region_id))
            .await
            .map_err(|_| {
                Error::upstream_timeout(format!("snapshot read for region '{region_id}'"))
            })?
    }
}

/// Upper-case a callsign and drop every whitespace character.
fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

fn find_flight<'a>(flights: &'a [FlightRecord], query: &str) -> Option<&'a FlightRecord> {
    let normalized = normalize(query);
    if normalized.is_empty() {
        return None;
    }

    flights
        .iter()
        .find(|f| f.callsign.eq_ignore_ascii_case(query))
        .or_else(|| {
            flights
                .iter()
                .find(|f| normalize(&f.callsign) == normalized)
        })
        .or_else(|| flights.iter().find(|f| normalize(&f.icao24) == normalized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::AnomalyRule;
    use crate::error::ErrorKind;
    use crate::store::SnapshotStore;
    use async_trait::async_trait;

    fn record(icao24: &str, callsign: &str, alt: f64, speed: f64, vrate: f64) -> FlightRecord {
        let mut flight = FlightRecord::new(icao24, callsign);
        flight.altitude = Some(alt);
        flight.ground_speed = Some(speed);
        flight.vertical_rate = Some(vrate);
        flight
    }

    fn service_with(flights: Vec<FlightRecord>) -> FlightQueryService {
        let store = SnapshotStore::new();
        store
            .replace(RegionSnapshot::new("region1", Utc::now(), flights))
            .unwrap();
        store
            .replace(RegionSnapshot::new("empty", Utc::now(), Vec::new()))
            .unwrap();
        FlightQueryService::new(Arc::new(store))
    }

    fn mixed_traffic() -> Vec<FlightRecord> {
        vec![
            record("000001", "NORM1", 10000.0, 230.0, 0.0),
            record("4baa1a", "THY4KZ  ", 9000.0, 25.0, 2.0),
            record("000002", "NORM2", 8000.0, 200.0, 1.0),
            record("000003", "CLIMB3", 4000.0, 180.0, 22.0),
            FlightRecord::new("000004", ""),
        ]
    }

    #[tokio::test]
    async fn test_list_region_snapshot_keeps_order() {
        let service = service_with(mixed_traffic());
        let view = service.list_region_snapshot("region1").await.unwrap();
        let ids: Vec<&str> = view.flights.iter().map(|f| f.flight.icao24.as_str()).collect();
        assert_eq!(ids, vec!["000001", "4baa1a", "000002", "000003", "000004"]);
        assert_eq!(view.region_id, "region1");
    }

    #[tokio::test]
    async fn test_unknown_region_differs_from_empty() {
        let service = service_with(mixed_traffic());
        let err = service.list_region_snapshot("region9").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RegionNotFound);

        let view = service.list_region_snapshot("empty").await.unwrap();
        assert!(view.flights.is_empty());
    }

    #[tokio::test]
    async fn test_alerts_are_a_stable_filter() {
        let service = service_with(mixed_traffic());
        let all = service.list_region_snapshot("region1").await.unwrap();
        let alerts = service.list_active_alerts("region1").await.unwrap();

        let expected: Vec<AnnotatedFlight> = all.anomalous().cloned().collect();
        assert_eq!(alerts.flights, expected);
        assert_eq!(alerts.flights.len(), 2);
        assert_eq!(
            alerts.flights[0].verdict.reasons,
            vec![AnomalyRule::LowSpeedAtAltitude]
        );
        assert_eq!(
            alerts.flights[1].verdict.reasons,
            vec![AnomalyRule::RapidVerticalRate]
        );
    }

    #[tokio::test]
    async fn test_callsign_matching_variants() {
        let service = service_with(mixed_traffic());
        for query in ["thy4kz", "THY4KZ", " THY4KZ ", "THY 4KZ", "THY4KZ  "] {
            let found = service.get_by_callsign("region1", query).await.unwrap();
            assert_eq!(found.flight.icao24, "4baa1a", "query {query:?}");
        }
    }

    #[tokio::test]
    async fn test_icao24_fallback() {
        let service = service_with(mixed_traffic());
        let found = service.get_by_callsign("region1", "4BAA1A").await.unwrap();
        assert_eq!(found.flight.display_id(), "THY4KZ");

        let found = service.get_by_callsign("region1", "000004").await.unwrap();
        assert_eq!(found.flight.display_id(), "000004");
    }

    #[tokio::test]
    async fn test_exact_match_wins_over_normalized() {
        let service = service_with(vec![
            record("00000a", "AB C", 1000.0, 100.0, 0.0),
            record("00000b", "ABC", 1000.0, 100.0, 0.0),
        ]);
        let found = service.get_by_callsign("region1", "abc").await.unwrap();
        assert_eq!(found.flight.icao24, "00000b");
    }

    #[tokio::test]
    async fn test_unknown_flight() {
        let service = service_with(mixed_traffic());
        let err = service
            .get_by_callsign("region1", "nonexistent")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FlightNotFound);
    }

    #[tokio::test]
    async fn test_blank_query_never_matches_blank_callsign() {
        let service = service_with(mixed_traffic());
        let err = service.get_by_callsign("region1", "   ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FlightNotFound);
    }

    #[tokio::test]
    async fn test_repeated_calls_are_identical() {
        let service = service_with(mixed_traffic());
        let first = serde_json::to_vec(&service.list_region_snapshot("region1").await.unwrap())
            .unwrap();
        let second = serde_json::to_vec(&service.list_region_snapshot("region1").await.unwrap())
            .unwrap();
        assert_eq!(first, second);
    }

    #[derive(Debug)]
    struct StalledSource;

    #[async_trait]
    impl SnapshotSource for StalledSource {
        async fn get_snapshot(&self, _region_id: &str) -> Result<Arc<RegionSnapshot>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(Error::internal("unreachable"))
        }
    }

    #[tokio::test]
    async fn test_slow_read_times_out() {
        let service = FlightQueryService::new(Arc::new(StalledSource))
            .with_read_timeout(Duration::from_millis(20));
        let err = service.list_active_alerts("region1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamTimeout);
    }
}
