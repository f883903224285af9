//! `airspace-copilot` - Regional flight snapshots for operations and travelers
//!
//! This library loads periodic per-region flight snapshots, classifies each
//! flight against simple kinematic anomaly rules, and serves the results to
//! two conversational personas: an operations analyst and a traveler
//! assistant that can borrow the analyst's regional view.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod agent;
pub mod anomaly;
pub mod cli;
pub mod config;
pub mod error;
pub mod flight;
pub mod llm;
pub mod logging;
pub mod query;
pub mod store;
pub mod watch;

pub use agent::{AgentContext, DelegationRouter, OpsSession, Persona, TravelerSession};
pub use anomaly::{classify, AnomalyRule, AnomalyVerdict};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use flight::{AnnotatedFlight, FlightRecord, RegionSnapshot};
pub use logging::init_logging;
pub use query::{FlightQueryService, RegionView};
pub use store::{SnapshotSource, SnapshotStore, StoreStats};
pub use watch::{SnapshotWatcher, WatchHandle};
