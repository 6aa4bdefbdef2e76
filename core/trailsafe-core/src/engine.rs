//! Action origination and journal reconciliation.
//!
//! `TripEngine` ties the shared store, the remote backend and the wake
//! signal together. Any context may *originate* an action through it (the
//! widget and live activity link this crate too), but only the main process
//! runs `reconcile`, on every foreground activation, on every wake signal,
//! and on a coarse periodic timer as a backstop for dropped signals.
//!
//! There is no true cancellation of an in-flight remote action once its
//! intent is journaled: cancelling only stops the local wait, not the
//! possibility that the server already applied the action. That is why stale
//! intents are recovered by re-syncing from the authoritative record rather
//! than trusting local assumptions.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::backend::TripBackend;
use crate::error::{Result, TripError};
use crate::journal::{self, ActionKind, ActionOutcome, ActionPhase};
use crate::store::{self, SharedStore};
use crate::trip::TripSnapshot;
use crate::wake::{WakeSignal, RECONCILE_CHANNEL};

/// What a reconciliation pass did, for host logging and backstop scheduling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Succeeded entries whose outcomes were merged into the snapshot.
    pub merged: Vec<ActionKind>,
    /// Stale intents cleared and recovered via re-sync.
    pub recovered_stale: Vec<ActionKind>,
    /// Failed or undecodable entries that were swept away.
    pub cleared: Vec<ActionKind>,
    /// Fresh intents left alone; their remote call may still be in flight.
    pub still_pending: Vec<ActionKind>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
            && self.recovered_stale.is_empty()
            && self.cleared.is_empty()
            && self.still_pending.is_empty()
    }
}

pub struct TripEngine<S, B, W> {
    store: S,
    backend: B,
    wake: W,
}

impl<S: SharedStore, B: TripBackend, W: WakeSignal> TripEngine<S, B, W> {
    pub fn new(store: S, backend: B, wake: W) -> Self {
        TripEngine {
            store,
            backend,
            wake,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Syncs the snapshot from the authoritative trip record. Main process
    /// only. A terminal status clears the stored snapshot so the other
    /// surfaces fall back to "no active trip".
    pub fn sync_trip(&self, id: &str) -> Result<Option<TripSnapshot>> {
        let trip = self.backend.fetch_trip(id)?;
        if trip.status.is_terminal() {
            store::clear_snapshot(&self.store)?;
            info!(trip_id = id, status = ?trip.status, "Trip ended, snapshot cleared");
            Ok(None)
        } else {
            store::save_snapshot(&self.store, &trip)?;
            Ok(Some(trip))
        }
    }

    /// Originates a check-in or checkout from any context.
    ///
    /// Protocol order is load-bearing: journal the intent durably, then call
    /// the remote action, then resolve the journal. On failure the entry is
    /// deleted outright and the error returned; the user decides whether to
    /// re-tap (no automatic retry of safety actions).
    pub fn originate(&self, kind: ActionKind, now: DateTime<Utc>) -> Result<ActionOutcome> {
        let snapshot = store::load_snapshot(&self.store).ok_or(TripError::NoActiveTrip)?;
        let token = snapshot
            .action_token(kind)
            .ok_or(TripError::ActionUnavailable { kind })?
            .to_string();

        journal::write_intent(&self.store, kind, &token, &snapshot.id, now)?;

        match self.call_remote(kind, &token) {
            Ok(outcome) => {
                journal::record_success(&self.store, kind, &snapshot.id, &outcome, now)?;
                self.wake.signal(RECONCILE_CHANNEL);
                Ok(outcome)
            }
            Err(err) => {
                // Delete, don't mark failed: a `Failed` entry carrying stale
                // assumptions could convince the main process a no-op
                // happened.
                journal::clear(&self.store, kind)?;
                warn!(%kind, error = %err, "Remote action failed, journal entry cleared");
                Err(err.into())
            }
        }
    }

    /// Reconciles the action journal against the snapshot. Main process only.
    pub fn reconcile(&self, now: DateTime<Utc>) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for kind in ActionKind::ALL {
            let Some(raw) = self.store.get(journal::key(kind)) else {
                continue;
            };
            let Some(entry) = journal::decode(&raw) else {
                journal::clear(&self.store, kind)?;
                report.cleared.push(kind);
                continue;
            };

            match entry.phase {
                ActionPhase::Succeeded => {
                    self.merge_outcome(&entry.trip_id, entry.outcome.as_ref())?;
                    journal::clear(&self.store, kind)?;
                    info!(%kind, trip_id = %entry.trip_id, "Merged confirmed action outcome");
                    report.merged.push(kind);
                }
                ActionPhase::Intended if entry.is_stale(now) => {
                    // The originating process likely died mid-call. The
                    // server may or may not have applied the action, so the
                    // only safe recovery is a re-sync from the authoritative
                    // record.
                    journal::clear(&self.store, kind)?;
                    warn!(
                        %kind,
                        trip_id = %entry.trip_id,
                        intent_at = %entry.intent_written_at,
                        "Stale intent cleared, re-syncing from server"
                    );
                    if let Err(err) = self.sync_trip(&entry.trip_id) {
                        warn!(trip_id = %entry.trip_id, error = %err, "Recovery re-sync failed");
                    }
                    report.recovered_stale.push(kind);
                }
                ActionPhase::Intended => {
                    report.still_pending.push(kind);
                }
                ActionPhase::Failed => {
                    journal::clear(&self.store, kind)?;
                    report.cleared.push(kind);
                }
            }
        }

        Ok(report)
    }

    fn call_remote(
        &self,
        kind: ActionKind,
        token: &str,
    ) -> std::result::Result<ActionOutcome, crate::backend::BackendError> {
        match kind {
            ActionKind::CheckIn => self.backend.check_in(token).map(ActionOutcome::from),
            ActionKind::CheckOut => self.backend.check_out(token).map(ActionOutcome::from),
        }
    }

    fn merge_outcome(&self, trip_id: &str, outcome: Option<&ActionOutcome>) -> Result<()> {
        let Some(mut snapshot) = store::load_snapshot(&self.store) else {
            return Ok(());
        };
        if snapshot.id != trip_id {
            warn!(
                trip_id,
                current = %snapshot.id,
                "Outcome belongs to a different trip, skipping merge"
            );
            return Ok(());
        }
        if let Some(outcome) = outcome {
            snapshot.apply_outcome(outcome);
        }
        if snapshot.status.is_terminal() {
            store::clear_snapshot(&self.store)
        } else {
            store::save_snapshot(&self.store, &snapshot)
        }
    }
}
