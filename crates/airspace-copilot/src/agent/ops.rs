//! The operations analyst session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::{AgentContext, Persona, PhaseGuard};
use crate::error::Result;
use crate::flight::AnnotatedFlight;
use crate::llm::{prompt, GenerationRequest};
use crate::query::RegionView;

/// Text used in place of a narrative when a region has no alerts.
const NO_ALERTS_TEXT: &str = "No active alerts at this time.";

/// Where an [`OpsSession`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpsPhase {
    /// No analysis has completed yet.
    Idle,
    /// An analysis is in flight.
    Analyzing,
    /// The last analysis completed and is held in the session.
    Summarized,
}

/// Aggregate facts about one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSummary {
    /// Region the counts describe.
    pub region_id: String,
    /// Capture time of the snapshot the counts came from.
    pub captured_at: DateTime<Utc>,
    /// Number of flights in the snapshot.
    pub total_flights: usize,
    /// Flights with no anomaly reason.
    pub normal_flights: usize,
    /// Flights with at least one anomaly reason.
    pub anomalous_flights: usize,
    /// Display identifiers of the anomalous flights, in ingestion order.
    pub anomalous_callsigns: Vec<String>,
}

impl RegionSummary {
    /// Count a region view.
    #[must_use]
    pub fn from_view(view: &RegionView) -> Self {
        let anomalous_callsigns: Vec<String> = view
            .anomalous()
            .map(|f| f.flight.display_id().to_string())
            .collect();
        let total_flights = view.flights.len();
        let anomalous_flights = anomalous_callsigns.len();

        Self {
            region_id: view.region_id.clone(),
            captured_at: view.captured_at,
            total_flights,
            normal_flights: total_flights - anomalous_flights,
            anomalous_flights,
            anomalous_callsigns,
        }
    }
}

/// Result of one regional analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpsReport {
    /// Aggregate counts.
    pub summary: RegionSummary,
    /// The anomalous flights with their verdicts.
    pub alerts: Vec<AnnotatedFlight>,
    /// Narrative text, absent when text generation was unavailable.
    pub narrative: Option<String>,
}

/// One row of an alerts report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEntry {
    /// Display identifier of the flight.
    pub callsign: String,
    /// ICAO24 address.
    pub icao24: String,
    /// Latitude in degrees, if known.
    pub latitude: Option<f64>,
    /// Longitude in degrees, if known.
    pub longitude: Option<f64>,
    /// Human-readable anomaly label.
    pub label: String,
    /// Kinematics in one line.
    pub details: String,
}

impl AlertEntry {
    fn from_flight(annotated: &AnnotatedFlight) -> Self {
        let flight = &annotated.flight;
        Self {
            callsign: flight.display_id().to_string(),
            icao24: flight.icao24.clone(),
            latitude: flight.latitude,
            longitude: flight.longitude,
            label: annotated.verdict.label().unwrap_or_default(),
            details: format!(
                "Alt: {}, Speed: {}, VRate: {}",
                format_measure(flight.altitude, "m"),
                format_measure(flight.ground_speed, "m/s"),
                format_measure(flight.vertical_rate, "m/s"),
            ),
        }
    }
}

fn format_measure(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.0}{unit}"))
}

/// Active alerts of a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertsReport {
    /// Region the alerts belong to.
    pub region_id: String,
    /// Capture time of the snapshot.
    pub captured_at: DateTime<Utc>,
    /// Alerts in ingestion order.
    pub alerts: Vec<AlertEntry>,
    /// Narrative text. A fixed sentence when there are no alerts.
    pub narrative: Option<String>,
}

/// Conversational state for the operations analyst.
///
/// This session has no delegation capability: only a [`super::DelegationRouter`]
/// can start a cross-persona call, and it only accepts traveler-originated
/// requests.
#[derive(Debug)]
pub struct OpsSession {
    context: AgentContext,
    phase: OpsPhase,
    last_report: Option<OpsReport>,
}

impl OpsSession {
    /// Create an idle session.
    #[must_use]
    pub fn new(context: AgentContext) -> Self {
        Self {
            context,
            phase: OpsPhase::Idle,
            last_report: None,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> OpsPhase {
        self.phase
    }

    /// The last completed analysis.
    #[must_use]
    pub fn last_report(&self) -> Option<&OpsReport> {
        self.last_report.as_ref()
    }

    /// Analyze a region and keep the result.
    ///
    /// The previous result is only replaced once the new one is complete. A
    /// failed or cancelled analysis leaves the phase and last report as they
    /// were.
    ///
    /// # Errors
    ///
    /// Returns the query errors of [`crate::query::FlightQueryService`].
    /// Text generation failures never fail the analysis.
    pub async fn analyze(&mut self, region_id: &str) -> Result<OpsReport> {
        let guard = PhaseGuard::enter(&mut self.phase, OpsPhase::Analyzing);
        let report = run_analysis(&self.context, region_id, None).await?;

        guard.commit(OpsPhase::Summarized);
        self.last_report = Some(report.clone());
        Ok(report)
    }

    /// Summarize the active alerts of a region. Does not change the phase.
    ///
    /// # Errors
    ///
    /// Returns the query errors of [`crate::query::FlightQueryService`].
    pub async fn summarize_alerts(&self, region_id: &str) -> Result<AlertsReport> {
        let view = self.context.queries().list_active_alerts(region_id).await?;
        let alerts: Vec<AlertEntry> = view.flights.iter().map(AlertEntry::from_flight).collect();

        let narrative = if alerts.is_empty() {
            Some(NO_ALERTS_TEXT.to_string())
        } else {
            self.context
                .narrate(GenerationRequest {
                    persona: Persona::Operations,
                    prompt: prompt::alerts_summary(region_id),
                    grounding: json!({ "region_id": region_id, "alerts": alerts }),
                    max_tokens: self.context.settings().ops_max_tokens,
                })
                .await
        };

        info!(region = %region_id, alerts = alerts.len(), "Alerts summarized");
        Ok(AlertsReport {
            region_id: view.region_id,
            captured_at: view.captured_at,
            alerts,
            narrative,
        })
    }
}

/// One regional analysis, without touching any session.
///
/// Facts are gathered first; the narrative is requested only once they exist.
/// With a `context_hint` the analysis was delegated and the narrative is kept
/// short.
pub(crate) async fn run_analysis(
    context: &AgentContext,
    region_id: &str,
    context_hint: Option<&str>,
) -> Result<OpsReport> {
    let view = context.queries().list_region_snapshot(region_id).await?;
    let summary = RegionSummary::from_view(&view);
    let alerts: Vec<AnnotatedFlight> = view.anomalous().cloned().collect();

    debug!(
        region = %region_id,
        total = summary.total_flights,
        anomalous = summary.anomalous_flights,
        "Region counted"
    );

    let sample: Vec<&AnnotatedFlight> = view
        .flights
        .iter()
        .take(context.settings().prompt_flight_limit)
        .collect();

    let (instruction, max_tokens) = match context_hint {
        None => (
            prompt::region_summary(
                region_id,
                summary.captured_at,
                summary.total_flights,
                summary.anomalous_flights,
            ),
            context.settings().ops_max_tokens,
        ),
        Some(hint) => (
            prompt::delegated_summary(
                region_id,
                summary.captured_at,
                summary.total_flights,
                summary.anomalous_flights,
                hint,
            ),
            context.settings().delegated_max_tokens,
        ),
    };

    let narrative = context
        .narrate(GenerationRequest {
            persona: Persona::Operations,
            prompt: instruction,
            grounding: json!({
                "summary": summary,
                "sample_flights": sample,
                "anomalous_flights": alerts,
            }),
            max_tokens,
        })
        .await;

    info!(
        region = %region_id,
        anomalous = summary.anomalous_flights,
        narrative = narrative.is_some(),
        "Region analyzed"
    );

    Ok(OpsReport {
        summary,
        alerts,
        narrative,
    })
}
