//! Error types for airspace-copilot.
//!
//! This module defines all error types used throughout the crate. Client-input
//! errors (unknown region, unknown flight, no active track) are kept apart from
//! upstream failures so the caller-facing layer can decide how to recover.

use std::path::PathBuf;
use thiserror::Error;

use crate::agent::Persona;

/// The main error type for airspace-copilot operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Query Errors ===
    /// The snapshot store holds no snapshot for the region.
    #[error("region '{region_id}' has no snapshot")]
    RegionNotFound {
        /// The region that was requested.
        region_id: String,
    },

    /// No flight in the current snapshot matches the identifier.
    #[error("flight '{query}' not found in the latest snapshot for region '{region_id}'")]
    FlightNotFound {
        /// The region that was searched.
        region_id: String,
        /// The callsign or ICAO24 address the caller supplied.
        query: String,
    },

    /// A traveler question arrived before any flight was tracked.
    #[error("no flight is being tracked in this session")]
    NoActiveTrack,

    // === Snapshot Errors ===
    /// A snapshot failed shape validation and was not accepted.
    #[error("malformed snapshot for '{origin}': {message}")]
    MalformedSnapshot {
        /// Region id or file the snapshot came from.
        origin: String,
        /// Description of the validation failure.
        message: String,
    },

    // === Upstream Errors ===
    /// An upstream call did not finish within its time budget.
    #[error("upstream timed out: {operation}")]
    UpstreamTimeout {
        /// Description of the operation that timed out.
        operation: String,
    },

    /// An upstream service could not produce a result.
    #[error("upstream '{service}' unavailable: {message}")]
    UpstreamUnavailable {
        /// Name of the upstream service.
        service: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    // === Delegation Errors ===
    /// A delegation request violated the one-hop Traveler to Operations rule.
    #[error("delegation from {origin} to {target} rejected: {reason}")]
    DelegationRejected {
        /// Persona that asked for the delegation.
        origin: Persona,
        /// Persona the request was addressed to.
        target: Persona,
        /// Why the router refused it.
        reason: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for airspace-copilot operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown region.
    RegionNotFound,
    /// Unknown flight.
    FlightNotFound,
    /// Question without a tracked flight.
    NoActiveTrack,
    /// Upstream call exceeded its timeout.
    UpstreamTimeout,
    /// Upstream call failed.
    UpstreamUnavailable,
    /// Snapshot rejected at the store boundary.
    MalformedSnapshot,
    /// Delegation refused by the router.
    DelegationRejected,
    /// Configuration could not be loaded or validated.
    Config,
    /// File system or serialization failure.
    Io,
    /// Bug.
    Internal,
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new malformed snapshot error.
    #[must_use]
    pub fn malformed(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedSnapshot {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Create a new upstream timeout error.
    #[must_use]
    pub fn upstream_timeout(operation: impl Into<String>) -> Self {
        Self::UpstreamTimeout {
            operation: operation.into(),
        }
    }

    /// Create a new upstream unavailable error.
    #[must_use]
    pub fn upstream_unavailable(service: &'static str, message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            service,
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RegionNotFound { .. } => ErrorKind::RegionNotFound,
            Self::FlightNotFound { .. } => ErrorKind::FlightNotFound,
            Self::NoActiveTrack => ErrorKind::NoActiveTrack,
            Self::MalformedSnapshot { .. } => ErrorKind::MalformedSnapshot,
            Self::UpstreamTimeout { .. } => ErrorKind::UpstreamTimeout,
            Self::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            Self::DelegationRejected { .. } => ErrorKind::DelegationRejected,
            Self::ConfigLoad(_) | Self::ConfigValidation { .. } => ErrorKind::Config,
            Self::Io(_) | Self::DirectoryCreate { .. } | Self::Json(_) => ErrorKind::Io,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check if this error was caused by caller input rather than a failure.
    ///
    /// Client errors are never retried automatically.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RegionNotFound | ErrorKind::FlightNotFound | ErrorKind::NoActiveTrack
        )
    }

    /// Check if this error came from an upstream dependency.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::UpstreamTimeout | ErrorKind::UpstreamUnavailable
        )
    }

    /// A message suitable for showing to the person who made the request.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::RegionNotFound { region_id } => {
                format!("No flight data is available for region '{region_id}' yet.")
            }
            Self::FlightNotFound { query, .. } => format!(
                "Sorry, I couldn't find flight {query}. Please check the callsign or ICAO24 code."
            ),
            Self::NoActiveTrack => {
                "Track a flight first, then ask your question about it.".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NoActiveTrack;
        assert_eq!(err.to_string(), "no flight is being tracked in this session");

        let err = Error::RegionNotFound {
            region_id: "region9".to_string(),
        };
        assert_eq!(err.to_string(), "region 'region9' has no snapshot");
    }

    #[test]
    fn test_flight_not_found_display() {
        let err = Error::FlightNotFound {
            region_id: "region1".to_string(),
            query: "nonexistent".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("nonexistent"));
        assert!(msg.contains("region1"));
    }

    #[test]
    fn test_client_errors() {
        assert!(Error::NoActiveTrack.is_client_error());
        assert!(Error::RegionNotFound {
            region_id: "r".to_string()
        }
        .is_client_error());
        assert!(!Error::upstream_timeout("llm").is_client_error());
        assert!(!Error::malformed("region1", "bad").is_client_error());
    }

    #[test]
    fn test_upstream_errors() {
        assert!(Error::upstream_timeout("snapshot read").is_upstream());
        assert!(Error::upstream_unavailable("llm", "connection refused").is_upstream());
        assert!(!Error::NoActiveTrack.is_upstream());
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            Error::malformed("region1", "missing icao24").kind(),
            ErrorKind::MalformedSnapshot
        );
        assert_eq!(
            Error::ConfigValidation {
                message: "x".to_string()
            }
            .kind(),
            ErrorKind::Config
        );
        assert_eq!(Error::internal("bug").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_malformed_display() {
        let err = Error::malformed("region1.json", "record 3 has no icao24");
        let msg = err.to_string();
        assert!(msg.contains("region1.json"));
        assert!(msg.contains("record 3 has no icao24"));
    }

    #[test]
    fn test_delegation_rejected_display() {
        let err = Error::DelegationRejected {
            origin: Persona::Operations,
            target: Persona::Traveler,
            reason: "only one hop is allowed".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("operations"));
        assert!(msg.contains("traveler"));
    }

    #[test]
    fn test_user_message_for_client_errors() {
        let err = Error::FlightNotFound {
            region_id: "region1".to_string(),
            query: "UAL321".to_string(),
        };
        assert!(err.user_message().contains("couldn't find flight UAL321"));
        assert!(Error::NoActiveTrack.user_message().contains("Track a flight"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
