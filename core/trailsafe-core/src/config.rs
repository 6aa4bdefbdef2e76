//! Shared directory resolution and small cross-process config flags.
//!
//! Flags live in the shared store so all three processes agree on them.
//! Missing or unrecognized values fall back to defaults, never errors: a
//! surface mid-rollout must keep rendering.

use std::env;
use std::path::PathBuf;

use tracing::warn;

use crate::error::{Result, TripError};
use crate::store::{SharedStore, DISPLAY_MODE_KEY, ENVIRONMENT_KEY};

/// Overrides the shared directory location (used by tests and dev setups).
pub const SHARED_DIR_ENV: &str = "TRAILSAFE_SHARED_DIR";

/// Returns the shared container directory (~/.trailsafe/shared by default).
pub fn shared_dir() -> Result<PathBuf> {
    if let Ok(path) = env::var(SHARED_DIR_ENV) {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or(TripError::HomeDirNotFound)?;
    Ok(home.join(".trailsafe").join("shared"))
}

/// How the widget renders the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    /// Relative time remaining ("1h 23m").
    #[default]
    Countdown,
    /// Absolute deadline ("6:30 PM").
    Clock,
}

impl DisplayMode {
    fn as_str(self) -> &'static str {
        match self {
            DisplayMode::Countdown => "countdown",
            DisplayMode::Clock => "clock",
        }
    }
}

/// Which backend environment the trip data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Production,
    Staging,
}

impl Environment {
    fn as_str(self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
        }
    }
}

pub fn load_display_mode<S: SharedStore + ?Sized>(store: &S) -> DisplayMode {
    match read_flag(store, DISPLAY_MODE_KEY).as_deref() {
        Some("countdown") | None => DisplayMode::Countdown,
        Some("clock") => DisplayMode::Clock,
        Some(other) => {
            warn!(value = other, "Unknown display mode, using default");
            DisplayMode::default()
        }
    }
}

pub fn save_display_mode<S: SharedStore + ?Sized>(store: &S, mode: DisplayMode) -> Result<()> {
    store.set(DISPLAY_MODE_KEY, mode.as_str().as_bytes())
}

pub fn load_environment<S: SharedStore + ?Sized>(store: &S) -> Environment {
    match read_flag(store, ENVIRONMENT_KEY).as_deref() {
        Some("production") | None => Environment::Production,
        Some("staging") => Environment::Staging,
        Some(other) => {
            warn!(value = other, "Unknown environment, using default");
            Environment::default()
        }
    }
}

pub fn save_environment<S: SharedStore + ?Sized>(store: &S, env: Environment) -> Result<()> {
    store.set(ENVIRONMENT_KEY, env.as_str().as_bytes())
}

fn feature_key(name: &str) -> String {
    format!("feature.{name}")
}

/// Feature entitlement flag. Absent means disabled.
pub fn feature_enabled<S: SharedStore + ?Sized>(store: &S, name: &str) -> bool {
    matches!(read_flag(store, &feature_key(name)).as_deref(), Some("1"))
}

pub fn set_feature_enabled<S: SharedStore + ?Sized>(
    store: &S,
    name: &str,
    enabled: bool,
) -> Result<()> {
    if enabled {
        store.set(&feature_key(name), b"1")
    } else {
        store.remove(&feature_key(name))
    }
}

fn read_flag<S: SharedStore + ?Sized>(store: &S, key: &str) -> Option<String> {
    let bytes = store.get(key)?;
    match String::from_utf8(bytes) {
        Ok(value) => Some(value.trim().to_string()),
        Err(e) => {
            warn!(key, error = %e, "Flag value is not UTF-8, ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_display_mode_defaults_to_countdown() {
        let store = MemoryStore::new();
        assert_eq!(load_display_mode(&store), DisplayMode::Countdown);
    }

    #[test]
    fn test_display_mode_round_trip() {
        let store = MemoryStore::new();
        save_display_mode(&store, DisplayMode::Clock).unwrap();
        assert_eq!(load_display_mode(&store), DisplayMode::Clock);
    }

    #[test]
    fn test_unknown_display_mode_falls_back_to_default() {
        let store = MemoryStore::new();
        store.set(DISPLAY_MODE_KEY, b"hologram").unwrap();
        assert_eq!(load_display_mode(&store), DisplayMode::Countdown);
    }

    #[test]
    fn test_environment_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(load_environment(&store), Environment::Production);
        save_environment(&store, Environment::Staging).unwrap();
        assert_eq!(load_environment(&store), Environment::Staging);
    }

    #[test]
    fn test_feature_flags_default_off() {
        let store = MemoryStore::new();
        assert!(!feature_enabled(&store, "live-activity"));
        set_feature_enabled(&store, "live-activity", true).unwrap();
        assert!(feature_enabled(&store, "live-activity"));
        set_feature_enabled(&store, "live-activity", false).unwrap();
        assert!(!feature_enabled(&store, "live-activity"));
    }
}
