//! Best-effort cross-process wake signal.
//!
//! After a widget or live activity resolves an action, it nudges the main
//! process to reconcile the journal promptly instead of waiting for its next
//! natural activation. The signal carries no payload and has no delivery
//! guarantee; it is purely a latency shortcut. Correctness comes from the
//! reconciliation backstops (foreground activation plus a coarse periodic
//! timer), never from this channel. Failures here must never block or crash
//! callers.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use tracing::warn;

use crate::config;
use crate::error::Result;

/// Channel asking the main process to reconcile the action journal.
pub const RECONCILE_CHANNEL: &str = "reconcile";

/// Fire-and-forget notification capability. At-most-effort: the signature is
/// infallible because no caller may depend on delivery.
pub trait WakeSignal {
    fn signal(&self, channel: &str);
}

/// Discards all signals. For tests and hosts with their own transport.
pub struct NoopWakeSignal;

impl WakeSignal for NoopWakeSignal {
    fn signal(&self, _channel: &str) {}
}

/// File-mtime based signal: writes the current instant to a per-channel file
/// in the shared directory. A poller compares the last-seen value against
/// [`FileWakeSignal::last_signal`]. A dropped write is simply a missed
/// shortcut; the reconciliation backstop catches up.
pub struct FileWakeSignal {
    dir: PathBuf,
}

impl FileWakeSignal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileWakeSignal { dir: dir.into() }
    }

    pub fn open_default() -> Result<Self> {
        Ok(FileWakeSignal {
            dir: config::shared_dir()?,
        })
    }

    fn channel_path(&self, channel: &str) -> PathBuf {
        self.dir.join(format!("wake-{channel}"))
    }

    /// The instant of the most recent signal on a channel, if any was
    /// observed and is readable.
    pub fn last_signal(&self, channel: &str) -> Option<DateTime<Utc>> {
        let content = fs::read_to_string(self.channel_path(channel)).ok()?;
        let millis: i64 = content.trim().parse().ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }
}

impl WakeSignal for FileWakeSignal {
    fn signal(&self, channel: &str) {
        let millis = Utc::now().timestamp_millis().to_string();
        if let Err(e) = fs::create_dir_all(&self.dir)
            .and_then(|()| fs::write(self.channel_path(channel), millis))
        {
            warn!(channel, error = %e, "Wake signal dropped");
        }
    }
}
