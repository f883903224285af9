//! Conversational agents for the two personas.
//!
//! - [`OpsSession`]: the operations analyst. `Idle → Analyzing → Summarized`.
//! - [`TravelerSession`]: the traveler assistant. `Idle → Tracking → Active`.
//! - [`DelegationRouter`]: lets a traveler question borrow a fresh operations
//!   analysis, one hop only.
//!
//! Every session shares an [`AgentContext`]: the query tools plus the text
//! generation capability. Facts are always gathered before text is requested,
//! and a failed or slow generator only removes the narrative, never the facts.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use airspace_copilot::agent::{AgentContext, TravelerSession};
//! use airspace_copilot::llm::DisabledGenerator;
//! use airspace_copilot::query::FlightQueryService;
//! use airspace_copilot::store::SnapshotStore;
//!
//! # async fn run() -> airspace_copilot::Result<()> {
//! let store = Arc::new(SnapshotStore::open("/var/lib/airspace")?);
//! let context = AgentContext::new(
//!     FlightQueryService::new(store),
//!     Arc::new(DisabledGenerator::new("offline")),
//! );
//!
//! let mut traveler = TravelerSession::new(context);
//! traveler.track("region1", "THY4KZ").await?;
//! let answer = traveler.ask("Are other flights nearby having issues?").await?;
//! println!("{:?}", answer.delegation);
//! # Ok(())
//! # }
//! ```

mod delegation;
mod intent;
mod ops;
mod traveler;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::llm::{GenerationRequest, TextGenerator};
use crate::query::FlightQueryService;

pub use delegation::{
    AgentDelegationRequest, AgentDelegationResult, DelegationOutcome, DelegationRouter,
};
pub use intent::{builtin_patterns, Intent, IntentClassifier, IntentPattern};
pub use ops::{AlertEntry, AlertsReport, OpsPhase, OpsReport, OpsSession, RegionSummary};
pub use traveler::{TrackReport, TrackedFlight, TravelerAnswer, TravelerPhase, TravelerSession};

/// The two agent roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    /// Operations analyst: regional summaries and anomaly surfacing.
    Operations,
    /// Traveler assistant: single-flight tracking and Q&A.
    Traveler,
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Operations => write!(f, "operations"),
            Self::Traveler => write!(f, "traveler"),
        }
    }
}

/// Tunables shared by every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    /// Bound on a single text generation call.
    pub generate_timeout: Duration,
    /// Reply length for operations narratives.
    pub ops_max_tokens: u32,
    /// Reply length for traveler narratives.
    pub traveler_max_tokens: u32,
    /// Reply length for a delegated analysis.
    pub delegated_max_tokens: u32,
    /// How many flights of a region are included verbatim in ops grounding.
    pub prompt_flight_limit: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            generate_timeout: Duration::from_secs(30),
            ops_max_tokens: 500,
            traveler_max_tokens: 400,
            delegated_max_tokens: 150,
            prompt_flight_limit: 10,
        }
    }
}

/// Capabilities every session is built on.
#[derive(Debug, Clone)]
pub struct AgentContext {
    queries: FlightQueryService,
    generator: Arc<dyn TextGenerator>,
    settings: AgentSettings,
}

impl AgentContext {
    /// Create a context with default settings.
    #[must_use]
    pub fn new(queries: FlightQueryService, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            queries,
            generator,
            settings: AgentSettings::default(),
        }
    }

    /// Replace the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The query tools.
    #[must_use]
    pub fn queries(&self) -> &FlightQueryService {
        &self.queries
    }

    /// The settings in effect.
    #[must_use]
    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Ask for narrative text. Any failure, including a timeout, yields `None`.
    pub(crate) async fn narrate(&self, request: GenerationRequest) -> Option<String> {
        let persona = request.persona;
        match tokio::time::timeout(
            self.settings.generate_timeout,
            self.generator.generate(&request),
        )
        .await
        {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                warn!(persona = %persona, error = %e, "Narrative unavailable; returning facts only");
                None
            }
            Err(_) => {
                warn!(
                    persona = %persona,
                    timeout_ms = u64::try_from(self.settings.generate_timeout.as_millis()).unwrap_or(u64::MAX),
                    "Narrative timed out; returning facts only"
                );
                None
            }
        }
    }
}

/// Holds a session in an in-flight phase for the length of one operation.
///
/// Dropped without [`PhaseGuard::commit`], as when the operation's future is
/// cancelled at an await point, it puts the previous phase back.
pub(crate) struct PhaseGuard<'a, P: Copy> {
    slot: &'a mut P,
    previous: P,
    committed: bool,
}

impl<'a, P: Copy> PhaseGuard<'a, P> {
    pub(crate) fn enter(slot: &'a mut P, during: P) -> Self {
        let previous = std::mem::replace(slot, during);
        Self {
            slot,
            previous,
            committed: false,
        }
    }

    pub(crate) fn commit(mut self, phase: P) {
        *self.slot = phase;
        self.committed = true;
    }
}

impl<P: Copy> Drop for PhaseGuard<'_, P> {
    fn drop(&mut self) {
        if !self.committed {
            *self.slot = self.previous;
        }
    }
}

/// A snapshot source whose reads can be slowed down.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct DelayedSource {
    pub(crate) store: crate::store::SnapshotStore,
    delay_ms: std::sync::atomic::AtomicU64,
}

#[cfg(test)]
impl DelayedSource {
    pub(crate) fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.delay_ms
            .store(millis, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl crate::store::SnapshotSource for DelayedSource {
    async fn get_snapshot(
        &self,
        region_id: &str,
    ) -> crate::error::Result<Arc<crate::flight::RegionSnapshot>> {
        let millis = self.delay_ms.load(std::sync::atomic::Ordering::SeqCst);
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
        self.store.get(region_id)
    }
}
