//! Runtime on/off switch for instrumentation.
//!
//! The switch is re-read at most once per refresh interval so it can be
//! flipped on a running process without paying an environment lookup on every
//! statement.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Environment variable consulted when no other name is configured.
pub const DEFAULT_TOGGLE_VAR: &str = "enableCorrelationLogs";

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Where the switch value comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ToggleSource {
    /// Constant value.
    Fixed { enabled: bool },

    /// Environment variable, parsed with [`parse_flag`]. Unset means off.
    Env { name: String },

    /// Flag owned by the host (for example a server property).
    #[serde(skip)]
    Shared(Arc<AtomicBool>),
}

impl Default for ToggleSource {
    fn default() -> Self {
        ToggleSource::Env {
            name: DEFAULT_TOGGLE_VAR.to_string(),
        }
    }
}

impl ToggleSource {
    fn read(&self) -> bool {
        match self {
            ToggleSource::Fixed { enabled } => *enabled,
            ToggleSource::Env { name } => std::env::var(name)
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(false),
            ToggleSource::Shared(flag) => flag.load(Ordering::Relaxed),
        }
    }
}

/// Cached view of a [`ToggleSource`].
#[derive(Debug)]
pub struct InstrumentationToggle {
    source: ToggleSource,
    refresh_interval: Duration,
    cached: Mutex<Option<(bool, Instant)>>,
}

impl InstrumentationToggle {
    pub fn new(source: ToggleSource, refresh_interval: Duration) -> Self {
        Self {
            source,
            refresh_interval,
            cached: Mutex::new(None),
        }
    }

    pub fn fixed(enabled: bool) -> Self {
        Self::new(ToggleSource::Fixed { enabled }, DEFAULT_REFRESH_INTERVAL)
    }

    pub fn from_env(name: impl Into<String>) -> Self {
        Self::new(ToggleSource::Env { name: name.into() }, DEFAULT_REFRESH_INTERVAL)
    }

    pub fn source(&self) -> &ToggleSource {
        &self.source
    }

    /// Current value, re-reading the source once the cached value is stale.
    pub fn is_enabled(&self) -> bool {
        if let ToggleSource::Fixed { enabled } = self.source {
            return enabled;
        }

        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let current = *cached;
        match current {
            Some((value, read_at)) if now.duration_since(read_at) < self.refresh_interval => value,
            _ => {
                let value = self.source.read();
                if current.map(|(previous, _)| previous) != Some(value) {
                    tracing::debug!(enabled = value, "Instrumentation toggle changed");
                }
                *cached = Some((value, now));
                value
            }
        }
    }
}

impl Default for InstrumentationToggle {
    fn default() -> Self {
        Self::new(ToggleSource::default(), DEFAULT_REFRESH_INTERVAL)
    }
}

/// Parse a boolean-like flag: `true/false`, `1/0`, `yes/no`, `on/off`.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
