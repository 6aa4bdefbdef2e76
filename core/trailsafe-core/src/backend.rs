//! Remote trip backend interface.
//!
//! The backend owns trip persistence, the authoritative overdue detection and
//! real alert delivery; this crate only mirrors it. Transport and wire format
//! belong to the host app's implementation of [`TripBackend`]. Every call is
//! fallible and must be timeout-bounded by the implementation: a timed-out
//! call is a [`BackendError::Timeout`], which the journal protocol treats the
//! same as any other failure.

use chrono::{DateTime, Utc};

use crate::trip::{TripSnapshot, TripStatus};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Capability token rejected by server")]
    TokenRejected,

    #[error("Trip not found: {0}")]
    NotFound(String),

    #[error("Remote error: {0}")]
    Remote(String),
}

impl BackendError {
    /// Terminal failures cannot succeed on a user-initiated re-tap and are
    /// surfaced as actionable messages; everything else is transient.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BackendError::TokenRejected | BackendError::NotFound(_))
    }
}

/// Confirmed server response to a check-in.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckInReceipt {
    pub checkin_count: u32,
    pub last_checkin_time: DateTime<Utc>,
}

/// Confirmed server response to a checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutReceipt {
    pub status: TripStatus,
}

impl From<CheckInReceipt> for crate::journal::ActionOutcome {
    fn from(receipt: CheckInReceipt) -> Self {
        crate::journal::ActionOutcome {
            checkin_count: Some(receipt.checkin_count),
            last_checkin_time: Some(receipt.last_checkin_time),
            status: None,
        }
    }
}

impl From<CheckOutReceipt> for crate::journal::ActionOutcome {
    fn from(receipt: CheckOutReceipt) -> Self {
        crate::journal::ActionOutcome {
            checkin_count: None,
            last_checkin_time: None,
            status: Some(receipt.status),
        }
    }
}

/// The three logical operations the trip backend exposes. All are expected
/// to be idempotent on the server side (per token-use for the actions).
pub trait TripBackend {
    fn fetch_trip(&self, id: &str) -> Result<TripSnapshot, BackendError>;
    fn check_in(&self, token: &str) -> Result<CheckInReceipt, BackendError>;
    fn check_out(&self, token: &str) -> Result<CheckOutReceipt, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        assert!(BackendError::TokenRejected.is_terminal());
        assert!(BackendError::NotFound("t".into()).is_terminal());
        assert!(!BackendError::Timeout.is_terminal());
        assert!(!BackendError::Network("reset".into()).is_terminal());
        assert!(!BackendError::Remote("500".into()).is_terminal());
    }
}
