//! Refresh timeline for the polled widget surface.
//!
//! The widget's host OS does not push updates; it asks for a finite,
//! pre-declared list of instants at which to re-render, plus the time it
//! must re-invoke the provider. Refresh budget is limited, so cadence
//! tightens only as the deadline nears.
//!
//! The timeline is rebuilt from scratch on every provider invocation and
//! never persisted. Entries carry wall-clock instants only: the widget
//! re-reads the shared store when an entry fires, so an entry can observe a
//! newer snapshot than the one it was scheduled against. Fire-time ordering
//! is guaranteed; snapshot freshness is not.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::trip::TripSnapshot;

/// How long the post-check-in confirmation flash stays on screen.
pub const CONFIRMATION_FLASH_SECS: i64 = 5;
/// Safety margin added after the last entry before the provider must rerun.
pub const RELOAD_MARGIN_SECS: i64 = 60;
/// Provider rerun interval when there is no active trip to watch.
pub const NO_TRIP_RELOAD_SECS: i64 = 900;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshEntry {
    pub fire_at: DateTime<Utc>,
    pub show_confirmation_flash: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    /// Strictly ascending; no two entries round to the same second.
    pub entries: Vec<RefreshEntry>,
    /// When the provider must be re-invoked even if no entry fired.
    pub next_reload_at: DateTime<Utc>,
}

/// Rounds to the nearest whole second for deduplication. Floating-point
/// timestamp arithmetic upstream can produce near-duplicate instants that
/// would otherwise double-fire.
fn rounded_second(at: DateTime<Utc>) -> i64 {
    (at.timestamp_millis() + 500).div_euclid(1000)
}

fn insert(entries: &mut BTreeMap<i64, RefreshEntry>, entry: RefreshEntry) {
    entries.entry(rounded_second(entry.fire_at)).or_insert(entry);
}

/// Builds the widget's refresh timeline for the current snapshot.
///
/// With `pending_confirmation` set (an action was just confirmed locally),
/// the timeline leads with a flash-on entry at `now` and a flash-off entry
/// at `now + 5s`; cadence entries start from the flash-off instant so the
/// flash is not starved by an overlapping cadence entry.
pub fn build_timeline(
    snapshot: Option<&TripSnapshot>,
    now: DateTime<Utc>,
    pending_confirmation: bool,
) -> Timeline {
    let Some(trip) = snapshot else {
        return Timeline {
            entries: vec![RefreshEntry {
                fire_at: now,
                show_confirmation_flash: false,
            }],
            next_reload_at: now + Duration::seconds(NO_TRIP_RELOAD_SECS),
        };
    };

    let mut entries: BTreeMap<i64, RefreshEntry> = BTreeMap::new();
    let mut cadence_start = now;

    if pending_confirmation {
        insert(
            &mut entries,
            RefreshEntry {
                fire_at: now,
                show_confirmation_flash: true,
            },
        );
        let flash_off = now + Duration::seconds(CONFIRMATION_FLASH_SECS);
        insert(
            &mut entries,
            RefreshEntry {
                fire_at: flash_off,
                show_confirmation_flash: false,
            },
        );
        cadence_start = flash_off;
    }

    let time_to_eta = trip.eta_at - now;
    let (count, spacing_secs) = if time_to_eta > Duration::seconds(3600) {
        (4, 900)
    } else if time_to_eta >= Duration::seconds(900) {
        (12, 300)
    } else {
        (15, 60)
    };

    for i in 0..count {
        insert(
            &mut entries,
            RefreshEntry {
                fire_at: cadence_start + Duration::seconds(i * spacing_secs),
                show_confirmation_flash: false,
            },
        );
    }

    let entries: Vec<RefreshEntry> = entries.into_values().collect();
    let next_reload_at = match entries.last() {
        Some(last) => last.fire_at + Duration::seconds(RELOAD_MARGIN_SECS),
        None => now + Duration::seconds(NO_TRIP_RELOAD_SECS),
    };
    tracing::debug!(
        entries = entries.len(),
        pending_confirmation,
        "Built refresh timeline"
    );

    Timeline {
        entries,
        next_reload_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trip::testutil::make_trip;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 20, 18, 0, 0).unwrap()
    }

    fn fire_offsets(timeline: &Timeline, now: DateTime<Utc>) -> Vec<i64> {
        timeline
            .entries
            .iter()
            .map(|e| (e.fire_at - now).num_seconds())
            .collect()
    }

    #[test]
    fn test_far_out_trip_uses_coarse_cadence() {
        let trip = make_trip(t0() + Duration::seconds(3601), 30);
        let timeline = build_timeline(Some(&trip), t0(), false);
        assert_eq!(fire_offsets(&timeline, t0()), vec![0, 900, 1800, 2700]);
    }

    #[test]
    fn test_mid_range_trip_uses_five_minute_cadence() {
        let trip = make_trip(t0() + Duration::seconds(3599), 30);
        let timeline = build_timeline(Some(&trip), t0(), false);
        let offsets = fire_offsets(&timeline, t0());
        assert_eq!(offsets.len(), 12);
        assert!(offsets.windows(2).all(|w| w[1] - w[0] == 300));
    }

    #[test]
    fn test_imminent_trip_uses_minute_cadence() {
        let trip = make_trip(t0() + Duration::seconds(899), 30);
        let timeline = build_timeline(Some(&trip), t0(), false);
        let offsets = fire_offsets(&timeline, t0());
        assert_eq!(offsets.len(), 15);
        assert!(offsets.windows(2).all(|w| w[1] - w[0] == 60));
    }

    #[test]
    fn test_past_eta_trip_uses_minute_cadence() {
        let trip = make_trip(t0() - Duration::minutes(10), 30);
        let timeline = build_timeline(Some(&trip), t0(), false);
        assert_eq!(timeline.entries.len(), 15);
    }

    #[test]
    fn test_no_trip_emits_single_entry() {
        let timeline = build_timeline(None, t0(), false);
        assert_eq!(timeline.entries.len(), 1);
        assert_eq!(timeline.entries[0].fire_at, t0());
        assert!(!timeline.entries[0].show_confirmation_flash);
        assert_eq!(
            timeline.next_reload_at,
            t0() + Duration::seconds(NO_TRIP_RELOAD_SECS)
        );
    }

    #[test]
    fn test_entries_are_strictly_ascending_and_deduped() {
        let trip = make_trip(t0() + Duration::seconds(1800), 30);
        let timeline = build_timeline(Some(&trip), t0(), true);
        let rounded: Vec<i64> = timeline
            .entries
            .iter()
            .map(|e| rounded_second(e.fire_at))
            .collect();
        for pair in rounded.windows(2) {
            assert!(pair[1] > pair[0], "entries must not share a second");
        }
        for pair in timeline.entries.windows(2) {
            assert!(pair[1].fire_at > pair[0].fire_at);
        }
    }

    #[test]
    fn test_confirmation_flash_pair_is_not_starved_by_cadence() {
        let trip = make_trip(t0() + Duration::seconds(7200), 30);
        let timeline = build_timeline(Some(&trip), t0() + Duration::seconds(2), true);
        let now = t0() + Duration::seconds(2);

        let first = &timeline.entries[0];
        assert_eq!(first.fire_at, now);
        assert!(first.show_confirmation_flash);

        let flash_off_at = now + Duration::seconds(CONFIRMATION_FLASH_SECS);
        let flash_off = timeline
            .entries
            .iter()
            .find(|e| e.fire_at == flash_off_at)
            .expect("flash-off entry present");
        assert!(!flash_off.show_confirmation_flash);

        // No entry may fire strictly between flash-on and flash-off.
        assert!(!timeline
            .entries
            .iter()
            .any(|e| e.fire_at > now && e.fire_at < flash_off_at));

        // Cadence resumes from the flash-off instant, not from `now`.
        let after: Vec<i64> = timeline
            .entries
            .iter()
            .filter(|e| e.fire_at > flash_off_at)
            .map(|e| (e.fire_at - flash_off_at).num_seconds())
            .collect();
        assert_eq!(after.first(), Some(&900));
    }

    #[test]
    fn test_next_reload_adds_safety_margin() {
        let trip = make_trip(t0() + Duration::seconds(3601), 30);
        let timeline = build_timeline(Some(&trip), t0(), false);
        let last = timeline.entries.last().unwrap().fire_at;
        assert_eq!(
            timeline.next_reload_at,
            last + Duration::seconds(RELOAD_MARGIN_SECS)
        );
    }

    #[test]
    fn test_rounding_merges_subsecond_duplicates() {
        let a = t0() + Duration::milliseconds(400);
        let b = t0() - Duration::milliseconds(400);
        assert_eq!(rounded_second(a), rounded_second(b));
    }
}
