// MateKeeper — keeps DesktopMate on the desktop and off the taskbar
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The seam between supervision logic and the OS.
//!
//! Everything the reconciler, locator and supervisor need from the window
//! system is expressed on [`Platform`]; the Win32 implementation lives in
//! `win32.rs` and tests run against the recording fake below. Delays go
//! through [`Clock`] so the empirical settle times never turn into real
//! sleeps in tests.

use std::fmt;
use std::time::Duration;

use crate::error::PlatformError;

/// Opaque top-level window handle borrowed from the OS. It can go stale at
/// any time (target destroys and recreates its window), so it is re-validated
/// before each use and never cached across a polling boundary.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct WindowHandle(pub isize);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// Extended window style bits (WS_EX_*). Mirrored here so the staging logic
// and its tests do not depend on the windows crate.
pub const EX_TOOLWINDOW: u32 = 0x0000_0080;
pub const EX_APPWINDOW: u32 = 0x0004_0000;
pub const EX_LAYERED: u32 = 0x0008_0000;
pub const EX_NOACTIVATE: u32 = 0x0800_0000;

pub trait Platform {
    /// Direct lookup by window class and/or title. `None` means not found.
    fn find_window(&self, class: Option<&str>, title: Option<&str>) -> Option<WindowHandle>;
    /// All top-level windows in z-order. Enumeration failures propagate.
    fn list_windows(&self) -> Result<Vec<WindowHandle>, PlatformError>;

    fn window_exists(&self, window: WindowHandle) -> bool;
    fn is_visible(&self, window: WindowHandle) -> bool;
    fn is_minimized(&self, window: WindowHandle) -> bool;
    fn is_foreground(&self, window: WindowHandle) -> bool;
    fn class_name(&self, window: WindowHandle) -> Option<String>;
    /// Executable name (no path) of the process owning the window.
    fn exe_name(&self, window: WindowHandle) -> Option<String>;

    fn show(&self, window: WindowHandle);
    fn show_no_activate(&self, window: WindowHandle);
    fn restore(&self, window: WindowHandle);
    /// Bring to foreground. Returns whether the OS accepted the request.
    fn activate(&self, window: WindowHandle) -> bool;
    fn set_full_opacity(&self, window: WindowHandle) -> Result<(), PlatformError>;
    fn ex_style(&self, window: WindowHandle) -> Result<u32, PlatformError>;
    fn set_ex_style(&self, window: WindowHandle, style: u32) -> Result<(), PlatformError>;
    fn set_window_parent(
        &self,
        window: WindowHandle,
        parent: WindowHandle,
    ) -> Result<(), PlatformError>;
    fn window_parent(&self, window: WindowHandle) -> Option<WindowHandle>;

    /// Post WM_CLOSE (or equivalent); best-effort.
    fn post_close(&self, window: WindowHandle);
    /// Fire-and-forget launch through the OS URI handler. No success signal.
    fn launch_uri(&self, uri: &str);
    fn process_running(&self, exe: &str) -> bool;
    /// Force-terminate every process with the given executable name.
    fn kill_processes_named(&self, exe: &str) -> usize;
    /// Start a fresh controller process (used by the Restart command).
    fn spawn_controller(&self) -> Result<(), PlatformError>;

    /// Transient, best-effort user feedback (tray balloon). Never fails.
    fn notify(&self, title: &str, body: &str);
    /// Blocking error dialog; reserved for the appearance timeout.
    fn fatal_dialog(&self, title: &str, body: &str);
}

pub trait Clock {
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
