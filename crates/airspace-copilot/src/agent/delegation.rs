//! Cross-persona delegation.
//!
//! The traveler assistant may ask the operations analyst for a fresh regional
//! analysis. Only that direction exists, and only for one hop: the analysis
//! runs against the router's own context, so no operations session is read or
//! written, and nothing on the operations side holds a router.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ops::{run_analysis, RegionSummary};
use super::{AgentContext, Persona};
use crate::error::{Error, Result};

/// A request from one persona to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDelegationRequest {
    /// Persona asking.
    pub origin_persona: Persona,
    /// Persona asked.
    pub target_persona: Persona,
    /// Region to analyze.
    pub region_id: String,
    /// What triggered the delegation.
    pub context_hint: String,
}

impl AgentDelegationRequest {
    /// A traveler-to-operations request for a region.
    #[must_use]
    pub fn traveler_to_ops(region_id: impl Into<String>, context_hint: impl Into<String>) -> Self {
        Self {
            origin_persona: Persona::Traveler,
            target_persona: Persona::Operations,
            region_id: region_id.into(),
            context_hint: context_hint.into(),
        }
    }
}

/// What a delegated analysis hands back: counts and callsigns, never session
/// state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDelegationResult {
    /// Derived facts.
    pub facts: RegionSummary,
    /// Short narrative, when text generation was available.
    pub narrative: Option<String>,
}

/// Delegation as seen by the traveler answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DelegationOutcome {
    /// The analysis completed.
    Completed(AgentDelegationResult),
    /// The analysis failed; the answer goes ahead without regional context.
    Unavailable {
        /// Why the analysis is missing.
        reason: String,
    },
}

impl DelegationOutcome {
    /// Facts, when the analysis completed.
    #[must_use]
    pub fn facts(&self) -> Option<&RegionSummary> {
        match self {
            Self::Completed(result) => Some(&result.facts),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Arbitrates delegation between personas.
#[derive(Debug, Clone)]
pub struct DelegationRouter {
    context: AgentContext,
    issued: Arc<AtomicU64>,
}

impl DelegationRouter {
    /// Create a router running analyses with the given context.
    #[must_use]
    pub fn new(context: AgentContext) -> Self {
        Self {
            context,
            issued: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of delegations accepted so far.
    #[must_use]
    pub fn delegations_issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    /// Run a delegated analysis.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DelegationRejected`] for anything other than a
    /// traveler-to-operations request, and the query errors of the analysis.
    pub async fn delegate(&self, request: &AgentDelegationRequest) -> Result<AgentDelegationResult> {
        if request.origin_persona != Persona::Traveler
            || request.target_persona != Persona::Operations
        {
            warn!(
                origin = %request.origin_persona,
                target = %request.target_persona,
                "Delegation rejected"
            );
            return Err(Error::DelegationRejected {
                origin: request.origin_persona,
                target: request.target_persona,
                reason: "only traveler-to-operations delegation is allowed".to_string(),
            });
        }

        self.issued.fetch_add(1, Ordering::Relaxed);
        info!(
            origin = %request.origin_persona,
            target = %request.target_persona,
            region = %request.region_id,
            hint = %request.context_hint,
            "Delegating to operations analysis"
        );

        let report = run_analysis(
            &self.context,
            &request.region_id,
            Some(&request.context_hint),
        )
        .await?;

        Ok(AgentDelegationResult {
            facts: report.summary,
            narrative: report.narrative,
        })
    }

    /// Run a delegated analysis, folding any failure into
    /// [`DelegationOutcome::Unavailable`].
    pub async fn delegate_or_unavailable(
        &self,
        request: &AgentDelegationRequest,
    ) -> DelegationOutcome {
        match self.delegate(request).await {
            Ok(result) => DelegationOutcome::Completed(result),
            Err(e) => {
                warn!(region = %request.region_id, error = %e, "Delegated analysis unavailable");
                DelegationOutcome::Unavailable {
                    reason: format!("analysis unavailable: {}", e.user_message()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::error::ErrorKind;
    use crate::flight::{FlightRecord, RegionSnapshot};
    use crate::llm::DisabledGenerator;
    use crate::query::FlightQueryService;
    use crate::store::SnapshotStore;

    fn router() -> DelegationRouter {
        let mut slow = FlightRecord::new("4baa1a", "THY4KZ");
        slow.altitude = Some(9000.0);
        slow.ground_speed = Some(25.0);

        let store = Arc::new(SnapshotStore::new());
        store
            .replace(RegionSnapshot::new(
                "region1",
                Utc::now(),
                vec![FlightRecord::new("000001", "NORM1"), slow],
            ))
            .unwrap();

        DelegationRouter::new(AgentContext::new(
            FlightQueryService::new(store),
            Arc::new(DisabledGenerator::new("offline")),
        ))
    }

    #[tokio::test]
    async fn test_traveler_to_ops_returns_facts() {
        let router = router();
        let request = AgentDelegationRequest::traveler_to_ops("region1", "nearby issues");

        let result = router.delegate(&request).await.unwrap();
        assert_eq!(result.facts.total_flights, 2);
        assert_eq!(result.facts.anomalous_callsigns, vec!["THY4KZ"]);
        assert!(result.narrative.is_none());
        assert_eq!(router.delegations_issued(), 1);
    }

    #[tokio::test]
    async fn test_reciprocal_request_is_rejected() {
        let router = router();
        let request = AgentDelegationRequest {
            origin_persona: Persona::Operations,
            target_persona: Persona::Traveler,
            region_id: "region1".to_string(),
            context_hint: "loop".to_string(),
        };

        let err = router.delegate(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DelegationRejected);
        assert_eq!(router.delegations_issued(), 0);
    }

    #[tokio::test]
    async fn test_same_persona_request_is_rejected() {
        let router = router();
        let mut request = AgentDelegationRequest::traveler_to_ops("region1", "self");
        request.target_persona = Persona::Traveler;
        assert!(router.delegate(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_failure_becomes_unavailable() {
        let router = router();
        let request = AgentDelegationRequest::traveler_to_ops("region9", "nearby issues");

        let outcome = router.delegate_or_unavailable(&request).await;
        match &outcome {
            DelegationOutcome::Unavailable { reason } => {
                assert!(reason.starts_with("analysis unavailable"));
            }
            DelegationOutcome::Completed(_) => panic!("expected unavailable"),
        }
        assert!(outcome.facts().is_none());
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = DelegationOutcome::Unavailable {
            reason: "analysis unavailable".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "unavailable");
    }
}
