//! Durable alert state, persisted across process restarts

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Alert escalation state for the current outage streak.
///
/// Invariant: `alert_count == 0 && last_alert_time == None` iff no alert has
/// been sent since the last recovery (or startup), and `is_service_down` is
/// true only while `alert_count > 0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertState {
    /// Epoch ms of the last successfully dispatched alert
    pub last_alert_time: Option<u64>,
    /// Alerts sent for the current outage streak
    pub alert_count: u32,
    /// True once at least one failure alert was delivered for the streak
    pub is_service_down: bool,
}

/// Loads and saves the alert state as a small JSON file.
///
/// A missing, unreadable, or corrupt file degrades to the default state; the
/// monitor must never fail a check because of its own bookkeeping.
#[derive(Debug)]
pub struct AlertStateStore {
    path: PathBuf,
}

impl AlertStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> AlertState {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return AlertState::default();
            }
            Err(e) => {
                tracing::warn!("Failed to read alert state {:?}: {}", self.path, e);
                return AlertState::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Failed to parse alert state {:?}: {}", self.path, e);
                AlertState::default()
            }
        }
    }

    pub fn save(&self, state: &AlertState) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}
