//! The traveler assistant session.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::delegation::{AgentDelegationRequest, DelegationOutcome, DelegationRouter};
use super::intent::{Intent, IntentClassifier};
use super::{AgentContext, Persona, PhaseGuard};
use crate::error::{Error, Result};
use crate::flight::AnnotatedFlight;
use crate::llm::{prompt, GenerationRequest};

/// Where a [`TravelerSession`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelerPhase {
    /// Nothing tracked.
    Idle,
    /// A track lookup is in flight.
    Tracking,
    /// A flight is tracked and questions can be answered.
    Active,
}

/// The flight a session is tracking, as matched at track time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedFlight {
    /// Region the flight was found in.
    pub region_id: String,
    /// The matched record and its verdict.
    pub flight: AnnotatedFlight,
}

/// Result of starting to track a flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackReport {
    /// Region the flight was found in.
    pub region_id: String,
    /// The matched record and its verdict.
    pub flight: AnnotatedFlight,
    /// One-line status for the traveler.
    pub issues: String,
    /// Narrative text, absent when text generation was unavailable.
    pub narrative: Option<String>,
}

/// Answer to a traveler question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelerAnswer {
    /// Detected intent.
    pub intent: Intent,
    /// Facts the answer is grounded in.
    pub grounding: Value,
    /// Regional context, present only for `nearby_issues` questions.
    pub delegation: Option<DelegationOutcome>,
    /// Narrative text, absent when text generation was unavailable.
    pub narrative: Option<String>,
}

/// Conversational state for the traveler assistant.
#[derive(Debug)]
pub struct TravelerSession {
    context: AgentContext,
    router: DelegationRouter,
    classifier: IntentClassifier,
    phase: TravelerPhase,
    tracked: Option<TrackedFlight>,
}

impl TravelerSession {
    /// Create an idle session with its own delegation router.
    #[must_use]
    pub fn new(context: AgentContext) -> Self {
        let router = DelegationRouter::new(context.clone());
        Self::with_router(context, router)
    }

    /// Create an idle session that delegates through `router`.
    #[must_use]
    pub fn with_router(context: AgentContext, router: DelegationRouter) -> Self {
        Self {
            context,
            router,
            classifier: IntentClassifier::new(),
            phase: TravelerPhase::Idle,
            tracked: None,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> TravelerPhase {
        self.phase
    }

    /// The tracked flight, if any.
    #[must_use]
    pub fn tracked(&self) -> Option<&TrackedFlight> {
        self.tracked.as_ref()
    }

    /// Start tracking a flight by callsign or ICAO24.
    ///
    /// A failed lookup drops any previous track and leaves the session idle.
    /// A cancelled lookup leaves the previous track in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FlightNotFound`], [`Error::RegionNotFound`] or a store
    /// timeout from [`crate::query::FlightQueryService::get_by_callsign`].
    pub async fn track(&mut self, region_id: &str, flight_id: &str) -> Result<TrackReport> {
        let guard = PhaseGuard::enter(&mut self.phase, TravelerPhase::Tracking);
        let lookup = self
            .context
            .queries()
            .get_by_callsign(region_id, flight_id)
            .await;

        let flight = match lookup {
            Ok(flight) => {
                guard.commit(TravelerPhase::Active);
                flight
            }
            Err(e) => {
                guard.commit(TravelerPhase::Idle);
                self.tracked = None;
                return Err(e);
            }
        };

        self.tracked = Some(TrackedFlight {
            region_id: region_id.to_string(),
            flight: flight.clone(),
        });
        info!(region = %region_id, flight = %flight.flight.display_id(), "Tracking flight");

        let issues = issues_line(&flight);
        let narrative = self
            .context
            .narrate(GenerationRequest {
                persona: Persona::Traveler,
                prompt: prompt::flight_update(flight.flight.display_id()),
                grounding: json!({ "flight": flight, "issues": issues }),
                max_tokens: self.context.settings().traveler_max_tokens,
            })
            .await;

        Ok(TrackReport {
            region_id: region_id.to_string(),
            flight,
            issues,
            narrative,
        })
    }

    /// Answer a question about the tracked flight.
    ///
    /// A `nearby_issues` question waits for a delegated operations analysis
    /// of the tracked flight's region. A failed delegation is reported in the
    /// answer and never fails it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveTrack`] if no flight is tracked.
    pub async fn ask(&mut self, question: &str) -> Result<TravelerAnswer> {
        let tracked = match (&self.phase, &self.tracked) {
            (TravelerPhase::Active, Some(tracked)) => tracked,
            _ => return Err(Error::NoActiveTrack),
        };

        let intent = self.classifier.classify(question);
        debug!(intent = %intent, "Answering traveler question");

        let delegation = if intent == Intent::NearbyIssues {
            let request = AgentDelegationRequest::traveler_to_ops(
                tracked.region_id.clone(),
                format!(
                    "traveler tracking {} asked: {question}",
                    tracked.flight.flight.display_id()
                ),
            );
            Some(self.router.delegate_or_unavailable(&request).await)
        } else {
            None
        };

        let grounding = json!({
            "flight": tracked.flight,
            "issues": issues_line(&tracked.flight),
            "intent": intent,
            "regional_context": delegation,
        });

        let has_regional_context = delegation.as_ref().is_some_and(|d| d.facts().is_some());
        let narrative = self
            .context
            .narrate(GenerationRequest {
                persona: Persona::Traveler,
                prompt: prompt::traveler_question(
                    tracked.flight.flight.display_id(),
                    question,
                    has_regional_context,
                ),
                grounding: grounding.clone(),
                max_tokens: self.context.settings().traveler_max_tokens,
            })
            .await;

        Ok(TravelerAnswer {
            intent,
            grounding,
            delegation,
            narrative,
        })
    }
}

/// One-line status for a tracked flight.
fn issues_line(flight: &AnnotatedFlight) -> String {
    match flight.verdict.label() {
        Some(label) => format!("Alert: {label}. Please monitor your flight status closely."),
        None => "Your flight appears to be operating normally.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;

    use crate::agent::DelayedSource;
    use crate::error::ErrorKind;
    use crate::flight::{FlightRecord, RegionSnapshot};
    use crate::llm::DisabledGenerator;
    use crate::query::FlightQueryService;
    use crate::store::SnapshotStore;

    fn session() -> TravelerSession {
        let mut normal = FlightRecord::new("000001", "NORM1");
        normal.altitude = Some(10000.0);
        normal.ground_speed = Some(230.0);

        let mut slow = FlightRecord::new("4baa1a", "THY4KZ");
        slow.altitude = Some(9000.0);
        slow.ground_speed = Some(25.0);

        let store = Arc::new(SnapshotStore::new());
        store
            .replace(RegionSnapshot::new("region1", Utc::now(), vec![normal, slow]))
            .unwrap();

        TravelerSession::new(AgentContext::new(
            FlightQueryService::new(store),
            Arc::new(DisabledGenerator::new("offline")),
        ))
    }

    #[tokio::test]
    async fn test_ask_before_track_is_rejected() {
        let mut traveler = session();
        let err = traveler.ask("Where is my flight?").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoActiveTrack);
    }

    #[tokio::test]
    async fn test_track_unknown_flight_stays_idle() {
        let mut traveler = session();
        let err = traveler.track("region1", "NOPE1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FlightNotFound);
        assert_eq!(traveler.phase(), TravelerPhase::Idle);
        assert!(traveler.tracked().is_none());
    }

    #[tokio::test]
    async fn test_track_then_ask() {
        let mut traveler = session();
        let report = traveler.track("region1", "norm1").await.unwrap();
        assert_eq!(report.flight.flight.icao24, "000001");
        assert_eq!(report.issues, "Your flight appears to be operating normally.");
        assert_eq!(traveler.phase(), TravelerPhase::Active);

        let answer = traveler.ask("Where is my flight now?").await.unwrap();
        assert_eq!(answer.intent, Intent::Position);
        assert!(answer.delegation.is_none());
        assert_eq!(answer.grounding["flight"]["icao24"], "000001");
        assert!(answer.narrative.is_none());
    }

    #[tokio::test]
    async fn test_anomalous_flight_issues_line() {
        let mut traveler = session();
        let report = traveler.track("region1", "THY4KZ").await.unwrap();
        assert_eq!(
            report.issues,
            "Alert: Low speed at high altitude. Please monitor your flight status closely."
        );
    }

    #[tokio::test]
    async fn test_failed_retrack_drops_previous_flight() {
        let mut traveler = session();
        traveler.track("region1", "NORM1").await.unwrap();
        assert!(traveler.track("region1", "NOPE1").await.is_err());

        assert_eq!(traveler.phase(), TravelerPhase::Idle);
        let err = traveler.ask("Is it delayed?").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoActiveTrack);
    }

    #[tokio::test]
    async fn test_cancelled_retrack_keeps_previous_flight() {
        let mut first = FlightRecord::new("000001", "NORM1");
        first.altitude = Some(10000.0);
        let second = FlightRecord::new("000002", "NORM2");

        let source = Arc::new(DelayedSource::default());
        source
            .store
            .replace(RegionSnapshot::new("region1", Utc::now(), vec![first, second]))
            .unwrap();
        let mut traveler = TravelerSession::new(AgentContext::new(
            FlightQueryService::new(source.clone()),
            Arc::new(DisabledGenerator::new("offline")),
        ));
        traveler.track("region1", "NORM1").await.unwrap();

        source.set_delay(Duration::from_millis(500));
        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), traveler.track("region1", "NORM2"))
                .await;
        assert!(cancelled.is_err());

        assert_eq!(traveler.phase(), TravelerPhase::Active);
        assert_eq!(traveler.tracked().unwrap().flight.flight.callsign, "NORM1");
        let answer = traveler.ask("Is it delayed?").await.unwrap();
        assert_eq!(answer.grounding["flight"]["icao24"], "000001");
    }

    #[tokio::test]
    async fn test_cancelled_first_track_stays_idle() {
        let source = Arc::new(DelayedSource::default());
        source
            .store
            .replace(RegionSnapshot::new(
                "region1",
                Utc::now(),
                vec![FlightRecord::new("000001", "NORM1")],
            ))
            .unwrap();
        source.set_delay(Duration::from_millis(500));
        let mut traveler = TravelerSession::new(AgentContext::new(
            FlightQueryService::new(source),
            Arc::new(DisabledGenerator::new("offline")),
        ));

        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), traveler.track("region1", "NORM1"))
                .await;
        assert!(cancelled.is_err());
        assert_eq!(traveler.phase(), TravelerPhase::Idle);
        assert!(traveler.tracked().is_none());
    }

    #[tokio::test]
    async fn test_nearby_question_delegates() {
        let mut traveler = session();
        traveler.track("region1", "NORM1").await.unwrap();

        let answer = traveler
            .ask("Are other flights nearby having issues?")
            .await
            .unwrap();
        assert_eq!(answer.intent, Intent::NearbyIssues);
        let facts = answer.delegation.as_ref().and_then(DelegationOutcome::facts).unwrap();
        assert_eq!(facts.anomalous_callsigns, vec!["THY4KZ"]);
        assert_eq!(
            answer.grounding["regional_context"]["facts"]["anomalous_callsigns"][0],
            "THY4KZ"
        );
    }

    #[test]
    fn test_issues_line_multiple_reasons() {
        let mut flight = FlightRecord::new("abc123", "X1");
        flight.altitude = Some(150.0);
        flight.ground_speed = Some(1.0);
        flight.vertical_rate = Some(-30.0);
        let line = issues_line(&AnnotatedFlight::classify(flight));
        assert_eq!(
            line,
            "Alert: Rapid vertical change; Stationary at low altitude. Please monitor your flight status closely."
        );
    }
}
