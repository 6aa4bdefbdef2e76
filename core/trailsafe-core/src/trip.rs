//! Trip snapshot data model.
//!
//! The snapshot is the locally cached, last-synced representation of a trip's
//! safety-relevant fields. The main app process is the only writer; the live
//! activity and widget are read-only consumers. All timestamps are UTC
//! instants; the named timezone identifiers are carried only so a renderer
//! can re-localize display, never for state derivation.
//!
//! # Rolling Update Tolerance
//!
//! The blob is read by three processes that may momentarily be running
//! different build versions, so every optional field uses a serde default:
//! a missing field means "feature disabled" (e.g. no token means that action
//! is unavailable), never a decode failure.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::journal::{ActionKind, ActionOutcome};

/// Authoritative, server-confirmed trip status as of the last sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Planned,
    Active,
    Overdue,
    OverdueNotified,
    Completed,
    Cancelled,
}

impl TripStatus {
    /// Terminal statuses end the trip's local lifecycle: the main process
    /// clears the stored snapshot so other surfaces fall back to a
    /// "no active trip" presentation.
    pub fn is_terminal(self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSnapshot {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub activity_icon: String,
    #[serde(default)]
    pub activity_name: String,
    #[serde(default)]
    pub primary_color: String,
    #[serde(default)]
    pub secondary_color: String,
    pub start_at: DateTime<Utc>,
    pub eta_at: DateTime<Utc>,
    /// Named timezone the start was authored in, for display re-localization only.
    #[serde(default)]
    pub start_timezone: Option<String>,
    /// Named timezone the ETA was authored in, for display re-localization only.
    #[serde(default)]
    pub eta_timezone: Option<String>,
    #[serde(default)]
    pub grace_minutes: u32,
    pub status: TripStatus,
    #[serde(default)]
    pub checkin_token: Option<String>,
    #[serde(default)]
    pub checkout_token: Option<String>,
    #[serde(default)]
    pub last_checkin_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub checkin_count: u32,
}

impl TripSnapshot {
    /// The deadline at which overdue-notification becomes authoritative.
    ///
    /// `grace_minutes >= 0` always, so `grace_end() >= eta_at` by construction.
    pub fn grace_end(&self) -> DateTime<Utc> {
        self.eta_at + Duration::minutes(i64::from(self.grace_minutes))
    }

    /// Capability token authorizing the given remote action, if the server
    /// granted one. Absence disables the action.
    pub fn action_token(&self, kind: ActionKind) -> Option<&str> {
        match kind {
            ActionKind::CheckIn => self.checkin_token.as_deref(),
            ActionKind::CheckOut => self.checkout_token.as_deref(),
        }
    }

    /// Merges a confirmed remote action outcome into this snapshot.
    ///
    /// `checkin_count` only moves forward: a stale outcome replayed after a
    /// fresher sync must not roll the counter back.
    pub fn apply_outcome(&mut self, outcome: &ActionOutcome) {
        if let Some(count) = outcome.checkin_count {
            self.checkin_count = self.checkin_count.max(count);
        }
        if let Some(at) = outcome.last_checkin_time {
            self.last_checkin_time = Some(at);
        }
        if let Some(status) = outcome.status {
            self.status = status;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::make_trip;
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 20, 18, 0, 0).unwrap()
    }

    #[test]
    fn test_grace_end_offsets_eta_by_grace_minutes() {
        let trip = make_trip(t0(), 30);
        assert_eq!(trip.grace_end(), t0() + Duration::minutes(30));
    }

    #[test]
    fn test_zero_grace_means_grace_end_equals_eta() {
        let trip = make_trip(t0(), 0);
        assert_eq!(trip.grace_end(), trip.eta_at);
    }

    #[test]
    fn test_action_token_absent_disables_action() {
        let mut trip = make_trip(t0(), 30);
        trip.checkin_token = None;
        assert!(trip.action_token(ActionKind::CheckIn).is_none());
        assert_eq!(trip.action_token(ActionKind::CheckOut), Some("co-token"));
    }

    #[test]
    fn test_apply_outcome_checkin_count_is_monotonic() {
        let mut trip = make_trip(t0(), 30);
        trip.checkin_count = 5;
        let outcome = ActionOutcome {
            checkin_count: Some(3),
            last_checkin_time: Some(t0()),
            status: None,
        };
        trip.apply_outcome(&outcome);
        assert_eq!(trip.checkin_count, 5);
        assert_eq!(trip.last_checkin_time, Some(t0()));
    }

    #[test]
    fn test_apply_outcome_status_overwrites() {
        let mut trip = make_trip(t0(), 30);
        let outcome = ActionOutcome {
            checkin_count: None,
            last_checkin_time: None,
            status: Some(TripStatus::Completed),
        };
        trip.apply_outcome(&outcome);
        assert_eq!(trip.status, TripStatus::Completed);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TripStatus::Completed.is_terminal());
        assert!(TripStatus::Cancelled.is_terminal());
        assert!(!TripStatus::Active.is_terminal());
        assert!(!TripStatus::OverdueNotified.is_terminal());
    }

    #[test]
    fn test_decode_minimal_snapshot_defaults_optional_fields() {
        // A snapshot written by an older build: only required fields present.
        let json = r#"{
            "id": "t-9",
            "title": "Shore walk",
            "start_at": "2026-08-20T14:00:00Z",
            "eta_at": "2026-08-20T18:00:00Z",
            "status": "active"
        }"#;
        let trip: TripSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(trip.grace_minutes, 0);
        assert_eq!(trip.checkin_count, 0);
        assert!(trip.checkin_token.is_none());
        assert!(trip.checkout_token.is_none());
        assert!(trip.last_checkin_time.is_none());
        assert_eq!(trip.status, TripStatus::Active);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&TripStatus::OverdueNotified).unwrap();
        assert_eq!(json, r#""overdue_notified""#);
    }
}
