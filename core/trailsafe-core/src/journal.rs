//! Crash-safe action journal for check-in and check-out.
//!
//! A check-in tapped on the widget or live activity runs in a process with
//! no path back into the main app's logic, and that process can be killed at
//! any instant. The journal is a two-phase record protecting the action:
//!
//! ```text
//! Absent -> Intended -> { Succeeded, (cleared on failure) } -> Absent
//! ```
//!
//! The intent is written durably *before* the remote call. That ordering is
//! the core correctness property: if the process dies mid-call, the journal
//! still proves "an action may have happened", and the main process
//! reconciles by re-syncing from the authoritative record instead of
//! assuming nothing happened.
//!
//! On remote failure the entry is deleted outright rather than written as
//! `Failed` with stale assumptions, and there is no automatic retry at this
//! layer: retrying a safety action without user consent risks double-firing.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::store::SharedStore;
use crate::trip::TripStatus;

/// An `Intended` entry older than this is presumed dead: the remote call
/// should have completed (or timed out) well within the window. Reconciliation
/// clears it and re-syncs from the server to recover true state.
pub const INTENT_STALE_SECS: i64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CheckIn,
    CheckOut,
}

impl ActionKind {
    pub const ALL: [ActionKind; 2] = [ActionKind::CheckIn, ActionKind::CheckOut];
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::CheckIn => write!(f, "check-in"),
            ActionKind::CheckOut => write!(f, "check-out"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPhase {
    Intended,
    Succeeded,
    Failed,
}

/// Fields the remote action response provided, merged into the snapshot at
/// reconciliation time. All optional so a partial response still merges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ActionOutcome {
    #[serde(default)]
    pub checkin_count: Option<u32>,
    #[serde(default)]
    pub last_checkin_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<TripStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub kind: ActionKind,
    pub token: String,
    pub trip_id: String,
    pub intent_written_at: DateTime<Utc>,
    pub phase: ActionPhase,
    #[serde(default)]
    pub outcome: Option<ActionOutcome>,
}

impl JournalEntry {
    /// An intended entry whose remote call should long since have resolved.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.intent_written_at) > Duration::seconds(INTENT_STALE_SECS)
    }
}

/// Store key for a pending action of the given kind. One entry per kind.
pub fn key(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::CheckIn => "pending-action.checkin",
        ActionKind::CheckOut => "pending-action.checkout",
    }
}

/// Decodes raw journal bytes. Corrupt bytes yield `None` with a warning.
pub fn decode(bytes: &[u8]) -> Option<JournalEntry> {
    match serde_json::from_slice(bytes) {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!(error = %e, "Failed to decode journal entry");
            None
        }
    }
}

/// Reads the pending entry for a kind, if any.
pub fn read<S: SharedStore + ?Sized>(store: &S, kind: ActionKind) -> Option<JournalEntry> {
    decode(&store.get(key(kind))?)
}

/// Durably records "this action is about to be attempted".
///
/// Must complete before the remote call starts. If an unresolved, non-stale
/// intent for the same kind already exists, the newer intent wins (the remote
/// endpoint is idempotent per token-use, so a duplicate is a UX anomaly, not
/// a correctness problem) and the conflict is logged.
pub fn write_intent<S: SharedStore + ?Sized>(
    store: &S,
    kind: ActionKind,
    token: &str,
    trip_id: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    if let Some(existing) = read(store, kind) {
        if existing.phase == ActionPhase::Intended && !existing.is_stale(now) {
            warn!(
                %kind,
                trip_id,
                prior_intent_at = %existing.intent_written_at,
                "Unresolved intent overwritten by newer intent (last writer wins)"
            );
        }
    }
    let entry = JournalEntry {
        kind,
        token: token.to_string(),
        trip_id: trip_id.to_string(),
        intent_written_at: now,
        phase: ActionPhase::Intended,
        outcome: None,
    };
    write(store, &entry)
}

/// Flips the pending entry to `Succeeded`, attaching the remote response
/// fields for the main process to merge.
pub fn record_success<S: SharedStore + ?Sized>(
    store: &S,
    kind: ActionKind,
    trip_id: &str,
    outcome: &ActionOutcome,
    now: DateTime<Utc>,
) -> Result<()> {
    let entry = match read(store, kind) {
        Some(mut existing) => {
            existing.phase = ActionPhase::Succeeded;
            existing.outcome = Some(outcome.clone());
            existing
        }
        None => {
            // The intent record vanished (e.g. cleared by a racing
            // reconciliation). Write a fresh success entry so the outcome is
            // still merged rather than lost.
            warn!(%kind, trip_id, "Recording success without a prior intent entry");
            JournalEntry {
                kind,
                token: String::new(),
                trip_id: trip_id.to_string(),
                intent_written_at: now,
                phase: ActionPhase::Succeeded,
                outcome: Some(outcome.clone()),
            }
        }
    };
    write(store, &entry)
}

/// Removes the entry for a kind. Used both on remote failure (the action is
/// treated as never having happened) and after reconciliation.
pub fn clear<S: SharedStore + ?Sized>(store: &S, kind: ActionKind) -> Result<()> {
    store.remove(key(kind))
}

fn write<S: SharedStore + ?Sized>(store: &S, entry: &JournalEntry) -> Result<()> {
    let bytes = serde_json::to_vec(entry)
        .map_err(|e| crate::error::TripError::json("Encoding journal entry", e))?;
    store.set(key(entry.kind), &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 20, 18, 0, 0).unwrap()
    }

    #[test]
    fn test_write_intent_round_trip() {
        let store = MemoryStore::new();
        write_intent(&store, ActionKind::CheckIn, "tok", "trip-1", t0()).unwrap();
        let entry = read(&store, ActionKind::CheckIn).unwrap();
        assert_eq!(entry.phase, ActionPhase::Intended);
        assert_eq!(entry.token, "tok");
        assert_eq!(entry.trip_id, "trip-1");
        assert_eq!(entry.intent_written_at, t0());
        assert!(entry.outcome.is_none());
    }

    #[test]
    fn test_kinds_do_not_collide() {
        let store = MemoryStore::new();
        write_intent(&store, ActionKind::CheckIn, "a", "trip-1", t0()).unwrap();
        write_intent(&store, ActionKind::CheckOut, "b", "trip-1", t0()).unwrap();
        assert_eq!(read(&store, ActionKind::CheckIn).unwrap().token, "a");
        assert_eq!(read(&store, ActionKind::CheckOut).unwrap().token, "b");
    }

    #[test]
    fn test_newer_intent_wins_over_unresolved_intent() {
        let store = MemoryStore::new();
        write_intent(&store, ActionKind::CheckIn, "first", "trip-1", t0()).unwrap();
        write_intent(
            &store,
            ActionKind::CheckIn,
            "second",
            "trip-1",
            t0() + Duration::seconds(3),
        )
        .unwrap();
        let entry = read(&store, ActionKind::CheckIn).unwrap();
        assert_eq!(entry.token, "second");
        assert_eq!(entry.phase, ActionPhase::Intended);
    }

    #[test]
    fn test_record_success_preserves_intent_metadata() {
        let store = MemoryStore::new();
        write_intent(&store, ActionKind::CheckIn, "tok", "trip-1", t0()).unwrap();
        let outcome = ActionOutcome {
            checkin_count: Some(2),
            last_checkin_time: Some(t0() + Duration::seconds(4)),
            status: None,
        };
        record_success(
            &store,
            ActionKind::CheckIn,
            "trip-1",
            &outcome,
            t0() + Duration::seconds(4),
        )
        .unwrap();
        let entry = read(&store, ActionKind::CheckIn).unwrap();
        assert_eq!(entry.phase, ActionPhase::Succeeded);
        assert_eq!(entry.token, "tok");
        assert_eq!(entry.intent_written_at, t0());
        assert_eq!(entry.outcome, Some(outcome));
    }

    #[test]
    fn test_clear_removes_entry() {
        let store = MemoryStore::new();
        write_intent(&store, ActionKind::CheckOut, "tok", "trip-1", t0()).unwrap();
        clear(&store, ActionKind::CheckOut).unwrap();
        assert!(read(&store, ActionKind::CheckOut).is_none());
    }

    #[test]
    fn test_staleness_boundary() {
        let store = MemoryStore::new();
        write_intent(&store, ActionKind::CheckIn, "tok", "trip-1", t0()).unwrap();
        let entry = read(&store, ActionKind::CheckIn).unwrap();
        // Exactly at the threshold is not yet stale (uses >).
        assert!(!entry.is_stale(t0() + Duration::seconds(INTENT_STALE_SECS)));
        assert!(entry.is_stale(t0() + Duration::seconds(INTENT_STALE_SECS + 1)));
    }

    #[test]
    fn test_corrupt_entry_decodes_to_none() {
        let store = MemoryStore::new();
        store.set(key(ActionKind::CheckIn), b"garbage").unwrap();
        assert!(read(&store, ActionKind::CheckIn).is_none());
    }
}
