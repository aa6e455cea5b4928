// MateKeeper — keeps DesktopMate on the desktop and off the taskbar
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "MATEKEEPER_LOG";

/// Install the global subscriber. The binary runs with
/// `windows_subsystem = "windows"` (no console), so output goes to
/// `matekeeper.log` next to the executable; stderr is the fallback.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let file = log_path().and_then(|p| {
        OpenOptions::new().create(true).append(true).open(p).ok()
    });
    match file {
        Some(file) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        }
    }
}

fn log_path() -> Option<PathBuf> {
    Some(std::env::current_exe().ok()?.parent()?.join("matekeeper.log"))
}
