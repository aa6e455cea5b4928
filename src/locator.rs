// MateKeeper — keeps DesktopMate on the desktop and off the taskbar
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Finds the supervised application's top-level window.

use tracing::debug;

use crate::config::TargetSpec;
use crate::error::PlatformError;
use crate::ops::{Platform, WindowHandle};

/// Resolve the target window, or `None` if it does not exist right now.
///
/// Strategy (a): direct class/title lookup — one OS call. Strategy (b), only
/// after (a) fails: enumerate all top-level windows and match the owning
/// process's executable name, first match in enumeration order. When several
/// windows share the process name, a window whose class contains the
/// configured hint wins (Unity apps put splash and helper windows next to the
/// real one). `None` is a retryable condition for callers, never fatal;
/// enumeration failures do propagate.
pub fn locate(
    platform: &dyn Platform,
    spec: &TargetSpec,
) -> Result<Option<WindowHandle>, PlatformError> {
    if spec.window_class.is_some() || spec.window_title.is_some() {
        if let Some(window) =
            platform.find_window(spec.window_class.as_deref(), spec.window_title.as_deref())
        {
            debug!(%window, "target window found by direct lookup");
            return Ok(Some(window));
        }
    }

    let mut first_match = None;
    for window in platform.list_windows()? {
        if !platform.is_visible(window) {
            continue;
        }
        let Some(exe) = platform.exe_name(window) else {
            continue;
        };
        if !exe.eq_ignore_ascii_case(&spec.process_name) {
            continue;
        }
        match &spec.class_hint {
            Some(hint) => {
                let hinted = platform
                    .class_name(window)
                    .is_some_and(|class| class.contains(hint.as_str()));
                if hinted {
                    debug!(%window, hint, "target window found by process name and class hint");
                    return Ok(Some(window));
                }
                if first_match.is_none() {
                    first_match = Some(window);
                }
            }
            None => {
                debug!(%window, "target window found by process name");
                return Ok(Some(window));
            }
        }
    }
    if let Some(window) = first_match {
        debug!(%window, "no class-hint match, taking first window of the process");
    }
    Ok(first_match)
}
