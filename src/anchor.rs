// MateKeeper — keeps DesktopMate on the desktop and off the taskbar
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Resolves the desktop anchor: the shell window the target gets re-parented
//! under so it renders at desktop level.

use tracing::debug;

use crate::ops::{Platform, WindowHandle};

/// Desktop window classes in priority order. `Progman` hosts the desktop on a
/// plain configuration; some compositor states move it to a `WorkerW`.
const DESKTOP_CLASSES: [&str; 2] = ["Progman", "WorkerW"];

const TASKBAR_CLASS: &str = "Shell_TrayWnd";

/// Try the known anchor candidates strictly in priority order and return the
/// first hit. Which candidate exists varies across OS versions and compositor
/// states, so callers must not assume any single strategy works.
pub fn resolve(platform: &dyn Platform) -> Option<WindowHandle> {
    for class in DESKTOP_CLASSES {
        if let Some(window) = platform.find_window(Some(class), None) {
            debug!(%window, class, "desktop anchor resolved");
            return Some(window);
        }
    }
    // Last resort: the taskbar's parent is the shell's desktop surface.
    let taskbar = platform.find_window(Some(TASKBAR_CLASS), None)?;
    let anchor = platform.window_parent(taskbar);
    if let Some(window) = anchor {
        debug!(%window, "desktop anchor derived from taskbar parent");
    }
    anchor
}
