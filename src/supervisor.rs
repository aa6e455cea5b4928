// MateKeeper — keeps DesktopMate on the desktop and off the taskbar
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Ties the controller's lifetime to the supervised application: launch,
//! wait for the window, watch it, and tear it down on command.

use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicU32, Ordering::SeqCst};
use std::time::Duration;

use tracing::{error, info};

use crate::config::{Config, TargetSpec};
use crate::error::PlatformError;
use crate::locator;
use crate::ops::{Clock, Platform, WindowHandle};

/// Process-wide controller state, one instance, passed explicitly to the
/// control flow and the timer callback. The target window handle is the only
/// piece both flows touch, and the timer only ever reads it plus the
/// should-exit signal.
pub struct ControllerState {
    target: AtomicIsize,
    retries: AtomicU32,
    /// Informational only; the OS window state is the source of truth.
    hidden: AtomicBool,
    monitor_active: AtomicBool,
    should_exit: AtomicBool,
}

impl ControllerState {
    pub fn new() -> Self {
        Self {
            target: AtomicIsize::new(0),
            retries: AtomicU32::new(0),
            hidden: AtomicBool::new(false),
            monitor_active: AtomicBool::new(false),
            should_exit: AtomicBool::new(false),
        }
    }

    pub fn set_target(&self, window: Option<WindowHandle>) {
        self.target.store(window.map_or(0, |w| w.0), SeqCst);
    }

    pub fn target_handle(&self) -> Option<WindowHandle> {
        match self.target.load(SeqCst) {
            0 => None,
            raw => Some(WindowHandle(raw)),
        }
    }

    pub fn bump_retries(&self) -> u32 {
        self.retries.fetch_add(1, SeqCst) + 1
    }

    pub fn retries(&self) -> u32 {
        self.retries.load(SeqCst)
    }

    pub fn set_hidden(&self, hidden: bool) {
        self.hidden.store(hidden, SeqCst);
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.load(SeqCst)
    }

    pub fn set_monitor_active(&self, active: bool) {
        self.monitor_active.store(active, SeqCst);
    }

    pub fn monitor_active(&self) -> bool {
        self.monitor_active.load(SeqCst)
    }

    pub fn request_exit(&self) {
        self.should_exit.store(true, SeqCst);
    }

    pub fn exit_requested(&self) -> bool {
        self.should_exit.load(SeqCst)
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Fire-and-forget launch. The launcher gives no success signal; we always
/// proceed to wait for the window.
pub fn launch(platform: &dyn Platform, spec: &TargetSpec) {
    info!(uri = %spec.launch_uri, "launching target");
    platform.launch_uri(&spec.launch_uri);
}

/// Poll for the target window until it appears or `max_wait` elapses.
/// `Ok(None)` is the timeout; enumeration failures propagate.
pub fn await_window(
    platform: &dyn Platform,
    clock: &dyn Clock,
    config: &Config,
) -> Result<Option<WindowHandle>, PlatformError> {
    let max_wait = config.timings.max_wait();
    let poll = config.timings.poll_interval();
    let mut waited = Duration::ZERO;
    while waited < max_wait {
        if let Some(window) = locator::locate(platform, &config.target)? {
            info!(%window, "target window appeared");
            // the first visible window may be a splash; let the target finish
            // initializing and re-resolve the handle
            clock.sleep(config.timings.post_detect_settle());
            return Ok(Some(
                locator::locate(platform, &config.target)?.unwrap_or(window),
            ));
        }
        clock.sleep(poll);
        waited += poll;
    }
    Ok(None)
}

/// One liveness check, run every monitor period from the tray window's timer.
/// Returns true once controller shutdown has been requested. The sole
/// mechanism tying controller lifetime to the target: a target that keeps its
/// process alive but destroys its window counts as gone.
pub fn monitor_tick(platform: &dyn Platform, config: &Config, state: &ControllerState) -> bool {
    if state.exit_requested() {
        return true;
    }
    let gone = match state.target_handle() {
        Some(window) => !platform.window_exists(window),
        None => true,
    };
    if gone {
        info!("target window is gone, shutting down");
        platform.notify(
            "MateKeeper",
            &format!("{} closed, controller exiting", config.target.process_name),
        );
        state.request_exit();
    }
    gone
}

/// Tray Exit: graceful close, bounded grace, force-kill if the process is
/// still around, then controller shutdown. Every OS failure on this path is
/// treated as "already gone".
pub fn exit_target(
    platform: &dyn Platform,
    clock: &dyn Clock,
    config: &Config,
    state: &ControllerState,
) {
    info!("exit requested");
    if let Some(window) = state.target_handle() {
        if platform.window_exists(window) {
            // un-hide first so the target's close handlers run normally
            platform.show(window);
            platform.post_close(window);
        }
    }
    clock.sleep(config.timings.exit_grace());
    if platform.process_running(&config.target.process_name) {
        let killed = platform.kill_processes_named(&config.target.process_name);
        info!(killed, "target force-terminated");
    }
    state.request_exit();
}

/// Tray Restart: close the target, then hand over to a fresh controller
/// process before this one exits. The new instance redoes the whole launch
/// sequence instead of inheriting any state.
pub fn restart_target(
    platform: &dyn Platform,
    clock: &dyn Clock,
    config: &Config,
    state: &ControllerState,
) {
    info!("restart requested");
    if let Some(window) = state.target_handle() {
        if platform.window_exists(window) {
            platform.post_close(window);
        }
    }
    clock.sleep(config.timings.restart_grace());
    if platform.process_running(&config.target.process_name) {
        let _ = platform.kill_processes_named(&config.target.process_name);
    }
    match platform.spawn_controller() {
        Ok(()) => info!("fresh controller spawned"),
        Err(e) => error!(error = %e, "could not spawn fresh controller"),
    }
    state.request_exit();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fake::{FakeClock, FakePlatform, FakeWindow};

    const TARGET: WindowHandle = WindowHandle(0x2a);

    fn platform_with_target() -> FakePlatform {
        let platform = FakePlatform::new();
        platform.add_window(FakeWindow::new(
            TARGET.0,
            "UnityWndClass",
            "DesktopMate",
            "DesktopMate.exe",
        ));
        platform
    }

    #[test]
    fn await_window_returns_quickly_when_the_window_exists() {
        let platform = platform_with_target();
        let clock = FakeClock::new();
        let config = Config::default();

        let found = await_window(&platform, &clock, &config).unwrap();

        assert_eq!(found, Some(TARGET));
        // only the post-detect settle was spent
        assert_eq!(
            clock.sleeps(),
            vec![config.timings.post_detect_settle()]
        );
    }

    #[test]
    fn await_window_times_out_at_the_configured_bound() {
        let platform = FakePlatform::new();
        let clock = FakeClock::new();
        let config = Config::default();

        let found = await_window(&platform, &clock, &config).unwrap();

        assert_eq!(found, None);
        // 60s at 500ms per poll: exactly 120 poll sleeps, not earlier or later
        assert_eq!(clock.sleep_count(), 120);
        assert_eq!(clock.total_slept(), Duration::from_secs(60));
    }

    #[test]
    fn monitor_tick_is_quiet_while_the_window_lives() {
        let platform = platform_with_target();
        let config = Config::default();
        let state = ControllerState::new();
        state.set_target(Some(TARGET));

        assert!(!monitor_tick(&platform, &config, &state));
        assert!(!state.exit_requested());
        assert!(platform.call_index("notify").is_none());
    }

    #[test]
    fn monitor_tick_requests_shutdown_once_the_window_is_gone() {
        let platform = platform_with_target();
        let config = Config::default();
        let state = ControllerState::new();
        state.set_target(Some(TARGET));
        platform.drop_window(TARGET.0);

        assert!(monitor_tick(&platform, &config, &state));
        assert!(state.exit_requested());
        assert!(platform.call_index("notify").is_some());
    }

    #[test]
    fn exit_closes_then_kills_then_terminates_in_order() {
        let platform = platform_with_target();
        let clock = FakeClock::new();
        let config = Config::default();
        let state = ControllerState::new();
        state.set_target(Some(TARGET));

        exit_target(&platform, &clock, &config, &state);

        let show = platform.call_index("show").unwrap();
        let close = platform.call_index("post_close").unwrap();
        let kill = platform.call_index("kill").unwrap();
        assert!(show < close && close < kill);
        // the grace period sits between close and kill
        assert_eq!(clock.sleeps(), vec![config.timings.exit_grace()]);
        assert!(state.exit_requested());
    }

    #[test]
    fn exit_skips_the_kill_when_the_process_already_died() {
        let platform = platform_with_target();
        platform.process_alive.set(false);
        let clock = FakeClock::new();
        let config = Config::default();
        let state = ControllerState::new();
        state.set_target(Some(TARGET));

        exit_target(&platform, &clock, &config, &state);

        assert!(platform.call_index("kill").is_none());
        assert!(state.exit_requested());
    }

    #[test]
    fn restart_spawns_the_new_controller_before_the_old_one_exits() {
        let platform = platform_with_target();
        let clock = FakeClock::new();
        let config = Config::default();
        let state = ControllerState::new();
        state.set_target(Some(TARGET));

        restart_target(&platform, &clock, &config, &state);

        let close = platform.call_index("post_close").unwrap();
        let kill = platform.call_index("kill").unwrap();
        let spawn = platform.call_index("spawn_controller").unwrap();
        assert!(close < kill && kill < spawn);
        assert_eq!(clock.sleeps(), vec![config.timings.restart_grace()]);
        // the spawn happened, and only then was exit requested
        assert!(state.exit_requested());
    }

    #[test]
    fn state_flags_follow_the_lifecycle() {
        let state = ControllerState::new();
        assert!(!state.is_hidden());
        assert!(!state.monitor_active());

        // reconcile succeeded, timer armed
        state.set_hidden(true);
        state.set_monitor_active(true);
        assert!(state.is_hidden());
        assert!(state.monitor_active());

        state.set_monitor_active(false);
        assert!(!state.monitor_active());
        assert!(state.is_hidden());
    }

    #[test]
    fn launch_is_fire_and_forget() {
        let platform = FakePlatform::new();
        launch(&platform, &TargetSpec::default());
        assert_eq!(
            platform.calls(),
            vec!["launch steam://run/3301060".to_string()]
        );
    }
}
