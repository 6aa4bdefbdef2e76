//! Error types for trailsafe-core operations.
//!
//! Nothing here is allowed to escape into a presentation surface as a panic:
//! read paths degrade to `None`/defaults, and only write paths and remote
//! calls return errors.

use crate::backend::BackendError;
use crate::journal::ActionKind;

/// All errors that can occur in trailsafe-core operations.
#[derive(Debug, thiserror::Error)]
pub enum TripError {
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON encoding error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("No active trip in the shared store")]
    NoActiveTrip,

    #[error("Action {kind} is not available for this trip (no token)")]
    ActionUnavailable { kind: ActionKind },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Convenience type alias for Results using TripError.
pub type Result<T> = std::result::Result<T, TripError>;

impl TripError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TripError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        TripError::Json {
            context: context.into(),
            source,
        }
    }

    /// Returns true if retrying without user intervention cannot succeed
    /// (e.g. the server rejected the capability token).
    pub fn is_terminal(&self) -> bool {
        match self {
            TripError::Backend(err) => err.is_terminal(),
            TripError::ActionUnavailable { .. } => true,
            _ => false,
        }
    }
}
