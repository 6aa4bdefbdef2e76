//! # trailsafe-core
//!
//! Core library for Trailsafe, providing shared trip-safety logic for all
//! clients (main app, live activity, widget).
//!
//! The three clients are independently scheduled processes with no shared
//! memory and no synchronous call path between them. They coordinate through
//! a small shared key/value store plus a best-effort wake signal, and any of
//! them may be suspended or killed at any moment. Everything in this crate is
//! built around that: state is *derived* identically everywhere, refresh
//! timing is pre-declared for the polled widget, and check-in/check-out
//! actions are protected by a two-phase journal so they survive process death.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Clients can wrap with async if needed.
//! - **Not thread-safe**: Clients provide their own synchronization (`Mutex`, `RwLock`).
//! - **Graceful degradation**: Missing or corrupt persisted data yields defaults, not errors.
//! - **Single source of truth**: All clients share these types and logic.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trailsafe_core::{build_timeline, derive, FileStore, store};
//!
//! let shared = FileStore::open_default()?;
//! let snapshot = store::load_snapshot(&shared);
//! if let Some(trip) = &snapshot {
//!     let state = derive(trip, chrono::Utc::now());
//!     println!("{}", state.display_status_text);
//! }
//! ```

// Public modules
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod journal;
pub mod state;
pub mod store;
pub mod timeline;
pub mod trip;
pub mod wake;

// Re-export commonly used items at crate root
pub use backend::{BackendError, CheckInReceipt, CheckOutReceipt, TripBackend};
pub use config::{DisplayMode, Environment};
pub use engine::{ReconcileReport, TripEngine};
pub use error::{Result, TripError};
pub use journal::{ActionKind, ActionOutcome, ActionPhase, JournalEntry};
pub use state::{derive, CountdownMode, DerivedState};
pub use store::{FileStore, MemoryStore, SharedStore};
pub use timeline::{build_timeline, RefreshEntry, Timeline};
pub use trip::{TripSnapshot, TripStatus};
pub use wake::{FileWakeSignal, NoopWakeSignal, WakeSignal};
