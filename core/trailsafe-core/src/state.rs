//! Trip state derivation.
//!
//! `derive` is the single source of truth for "what does this trip mean right
//! now". All three processes (main app, live activity, widget) call it with
//! their own clock; they may disagree about *recency* of the snapshot they
//! hold, never about *meaning*. It is pure and total: no I/O, no side
//! effects, deterministic for a given `(snapshot, now)` pair.
//!
//! # Staleness Tolerance
//!
//! The widget may not have seen a sync for a long time, so the overdue check
//! is done two ways: `status`-based (authoritative, last synced) and
//! time-based (`now > grace_end`). The time-based check overrides a stale
//! `active` status so urgency is eventually shown from the clock alone.

use chrono::{DateTime, Utc};

use crate::trip::{TripSnapshot, TripStatus};

pub const STATUS_TEXT_OVERDUE: &str = "OVERDUE";
pub const STATUS_TEXT_CHECK_IN_NOW: &str = "CHECK IN NOW";
pub const STATUS_TEXT_ACTIVE: &str = "ACTIVE TRIP";

/// Which band the countdown is in, so renderers never re-derive band logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownMode {
    /// Before the ETA: count down to `countdown_target` (= `eta_at`).
    ToEta,
    /// Between ETA and grace end: count down to `countdown_target` (= `grace_end`).
    ToGraceEnd,
    /// Past grace end: count *up* from `countdown_target` (= `grace_end`).
    SinceGraceEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedState {
    /// True once the trip is past its ETA, by synced status or local clock.
    pub is_past_eta: bool,
    /// Time-based overdue check (`now > grace_end`), independent of `status`.
    /// This is the stale-tolerant variant used by the polled widget.
    pub is_overdue: bool,
    /// True only when the server has confirmed emergency contacts were notified.
    pub contacts_notified: bool,
    pub display_status_text: &'static str,
    pub countdown_target: DateTime<Utc>,
    pub countdown_mode: CountdownMode,
}

/// Derives the presentable state for a trip at a given instant.
///
/// Rules, in priority order:
/// 1. Server says contacts were notified: "OVERDUE".
/// 2. Past the ETA by local clock, or server says overdue: "CHECK IN NOW".
/// 3. Otherwise: "ACTIVE TRIP".
pub fn derive(snapshot: &TripSnapshot, now: DateTime<Utc>) -> DerivedState {
    let grace_end = snapshot.grace_end();
    let is_overdue = now > grace_end;
    let contacts_notified = snapshot.status == TripStatus::OverdueNotified;
    let is_past_eta = now > snapshot.eta_at
        || matches!(
            snapshot.status,
            TripStatus::Overdue | TripStatus::OverdueNotified
        );

    let display_status_text = if contacts_notified {
        STATUS_TEXT_OVERDUE
    } else if is_past_eta {
        STATUS_TEXT_CHECK_IN_NOW
    } else {
        STATUS_TEXT_ACTIVE
    };

    // Three-band countdown: down to ETA, then down through grace, then up
    // from grace end. The band is decided by time alone so a renderer with a
    // stale status still shows a sensible clock.
    let (countdown_target, countdown_mode) = if now < snapshot.eta_at {
        (snapshot.eta_at, CountdownMode::ToEta)
    } else if now < grace_end {
        (grace_end, CountdownMode::ToGraceEnd)
    } else {
        (grace_end, CountdownMode::SinceGraceEnd)
    };

    DerivedState {
        is_past_eta,
        is_overdue,
        contacts_notified,
        display_status_text,
        countdown_target,
        countdown_mode,
    }
}
