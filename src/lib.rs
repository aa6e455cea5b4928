// MateKeeper — keeps DesktopMate on the desktop and off the taskbar
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Supervisor for a single desktop-pet application (DesktopMate by default).
//!
//! The binary launches the target through its URI handler, waits for the main
//! window, reconciles the window's presentation state (visible on the desktop,
//! out of the taskbar and alt-tab, parented under the desktop shell) and keeps
//! a tray menu with Exit / Restart. All OS access goes through the seam in
//! [`ops`] so the retry and timing logic is testable without a compositor.

pub mod anchor;
pub mod config;
pub mod error;
pub mod locator;
pub mod logging;
pub mod ops;
pub mod reconcile;
pub mod supervisor;

#[cfg(windows)]
pub mod tray;
#[cfg(windows)]
pub mod win32;
