// MateKeeper — keeps DesktopMate on the desktop and off the taskbar
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Target identity and timing knobs.
//!
//! Every empirical delay in the reconciliation sequence is configuration, not
//! a hardcoded sleep: the constants encode compositor timing assumptions and
//! need to stay tunable. An optional `matekeeper.toml` next to the executable
//! overrides the defaults; absent or broken files fall back to defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target: TargetSpec,
    pub timings: Timings,
}

/// Identifies the one supervised application. Immutable for the life of the
/// controller process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetSpec {
    /// Executable name used for the enumeration fallback and force-kill.
    pub process_name: String,
    /// URI handed to the OS launcher, fire-and-forget.
    pub launch_uri: String,
    /// Exact title for the direct window lookup.
    pub window_title: Option<String>,
    /// Exact class for the direct window lookup.
    pub window_class: Option<String>,
    /// Substring that breaks ties when several windows share the process
    /// name. DesktopMate is a Unity app, so its real window class contains
    /// "Unity" while splash/helper windows do not.
    pub class_hint: Option<String>,
}

impl Default for TargetSpec {
    fn default() -> Self {
        Self {
            process_name: "DesktopMate.exe".into(),
            launch_uri: "steam://run/3301060".into(),
            window_title: Some("DesktopMate".into()),
            window_class: None,
            class_hint: Some("Unity".into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Bound on waiting for the target window to appear after launch.
    pub max_wait_secs: u64,
    /// Poll interval inside the appearance wait.
    pub poll_interval_ms: u64,
    /// Settle delay between compositor-visible operations. Show/activate and
    /// style changes return before the compositor has applied them.
    pub settle_ms: u64,
    /// Show+activate polls before giving up on foreground confirmation.
    pub foreground_attempts: u32,
    /// SetParent attempts while the desktop shell may still be initializing.
    pub reparent_attempts: u32,
    /// Full reconciliation sequences before running degraded.
    pub max_retries: u32,
    /// Pause between full reconciliation attempts.
    pub retry_pause_ms: u64,
    /// Liveness monitor period; controller exits within one period of the
    /// target window disappearing.
    pub monitor_period_ms: u64,
    /// Grace between WM_CLOSE and force-kill on Exit.
    pub exit_grace_ms: u64,
    /// Grace between WM_CLOSE and force-kill on Restart.
    pub restart_grace_ms: u64,
    /// Extra wait after first sighting so the target finishes creating its
    /// real window.
    pub post_detect_settle_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            max_wait_secs: 60,
            poll_interval_ms: 500,
            settle_ms: 300,
            foreground_attempts: 3,
            reparent_attempts: 3,
            max_retries: 3,
            retry_pause_ms: 2000,
            monitor_period_ms: 2000,
            exit_grace_ms: 3000,
            restart_grace_ms: 2000,
            post_detect_settle_ms: 3000,
        }
    }
}

impl Timings {
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }

    pub fn exit_grace(&self) -> Duration {
        Duration::from_millis(self.exit_grace_ms)
    }

    pub fn restart_grace(&self) -> Duration {
        Duration::from_millis(self.restart_grace_ms)
    }

    pub fn post_detect_settle(&self) -> Duration {
        Duration::from_millis(self.post_detect_settle_ms)
    }
}

/// Load `matekeeper.toml` from the executable's directory, defaults otherwise.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    match std::fs::read_to_string(&path) {
        Ok(text) => match toml::from_str(&text) {
            Ok(config) => {
                info!(path = %path.display(), "configuration loaded");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid configuration, using defaults");
                Config::default()
            }
        },
        Err(_) => Config::default(),
    }
}

fn config_path() -> Option<PathBuf> {
    Some(std::env::current_exe().ok()?.parent()?.join("matekeeper.toml"))
}
