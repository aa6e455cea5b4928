// MateKeeper — keeps DesktopMate on the desktop and off the taskbar
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The window-state reconciler.
//!
//! Drives the target window into its desired presentation state: restored,
//! shown, fully opaque, out of the taskbar and alt-tab, non-activating, and
//! parented under the desktop anchor. Each individual OS call is fallible and
//! order-dependent, and the compositor applies several of them
//! asynchronously, so the sequence is staged with settle delays and the whole
//! thing is retried as a unit by the caller.

use tracing::{debug, info, warn};

use crate::anchor;
use crate::config::{Config, Timings};
use crate::error::{Outcome, PlatformError};
use crate::locator;
use crate::ops::{Clock, Platform, WindowHandle, EX_APPWINDOW, EX_NOACTIVATE, EX_TOOLWINDOW};
use crate::supervisor::ControllerState;

/// The stages of one reconciliation attempt, in execution order. Kept as
/// named states so the settle points stay visible and individually tunable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    RestoreFromMinimized,
    ShowAndActivate,
    ForceOpacity,
    StageStyleBits,
    ReparentToDesktop,
    ReassertVisible,
    ReassertToolWindow,
}

impl Step {
    pub const SEQUENCE: [Step; 7] = [
        Step::RestoreFromMinimized,
        Step::ShowAndActivate,
        Step::ForceOpacity,
        Step::StageStyleBits,
        Step::ReparentToDesktop,
        Step::ReassertVisible,
        Step::ReassertToolWindow,
    ];
}

/// One full pass over the sequence. Never panics and never propagates: any
/// OS-call failure aborts the attempt and is captured in the outcome for the
/// caller's retry loop. A stale handle at entry is an ordinary transient
/// failure.
pub fn run_attempt(
    platform: &dyn Platform,
    clock: &dyn Clock,
    timings: &Timings,
    window: WindowHandle,
) -> Outcome {
    if !platform.window_exists(window) {
        return Outcome::Transient(PlatformError::WindowGone(window.0));
    }
    for step in Step::SEQUENCE {
        if let Err(e) = apply(platform, clock, timings, window, step) {
            warn!(?step, error = %e, "reconcile step failed, aborting attempt");
            return Outcome::Transient(e);
        }
    }
    Outcome::Success
}

fn apply(
    platform: &dyn Platform,
    clock: &dyn Clock,
    timings: &Timings,
    window: WindowHandle,
    step: Step,
) -> Result<(), PlatformError> {
    match step {
        Step::RestoreFromMinimized => {
            if platform.is_minimized(window) {
                platform.restore(window);
                // give the compositor a beat before touching the window again
                clock.sleep(timings.settle());
            }
            Ok(())
        }
        Step::ShowAndActivate => {
            // show/activate return before some window classes are actually
            // foreground, so poll with a settle delay
            for attempt in 0..timings.foreground_attempts {
                platform.show(window);
                let _ = platform.activate(window);
                clock.sleep(timings.settle());
                if platform.is_foreground(window) {
                    return Ok(());
                }
                debug!(attempt, "window not foreground yet");
            }
            // not fatal: some windows refuse activation and style changes
            // still apply
            Ok(())
        }
        Step::ForceOpacity => {
            // defeat any inherited transparency
            platform.set_full_opacity(window)
        }
        Step::StageStyleBits => {
            // one bit per call with a settle in between: compositors have
            // been seen to partially ignore combined style changes
            let style = platform.ex_style(window)?;
            platform.set_ex_style(window, style & !EX_APPWINDOW)?;
            clock.sleep(timings.settle());

            let style = platform.ex_style(window)?;
            platform.set_ex_style(window, style | EX_TOOLWINDOW)?;
            clock.sleep(timings.settle());

            let style = platform.ex_style(window)?;
            platform.set_ex_style(window, style | EX_NOACTIVATE)?;
            clock.sleep(timings.settle());
            Ok(())
        }
        Step::ReparentToDesktop => {
            let Some(desktop) = anchor::resolve(platform) else {
                return Err(PlatformError::NoDesktopAnchor);
            };
            let mut last_error = None;
            for attempt in 0..timings.reparent_attempts {
                match platform.set_window_parent(window, desktop) {
                    Ok(()) => {
                        debug!(%window, %desktop, "window parented under desktop anchor");
                        return Ok(());
                    }
                    Err(e) => {
                        // the shell can refuse while still initializing
                        debug!(attempt, error = %e, "SetParent failed");
                        last_error = Some(e);
                        if attempt + 1 < timings.reparent_attempts {
                            clock.sleep(timings.settle());
                        }
                    }
                }
            }
            Err(last_error.unwrap_or(PlatformError::NoDesktopAnchor))
        }
        Step::ReassertVisible => {
            // steps above may have hidden or refocused the window
            if platform.window_exists(window) {
                platform.show_no_activate(window);
            } else {
                platform.show(window);
            }
            Ok(())
        }
        Step::ReassertToolWindow => {
            // re-parenting has been seen to reset the tool-window bit
            let style = platform.ex_style(window)?;
            platform.set_ex_style(window, style | EX_TOOLWINDOW)
        }
    }
}

/// Run the full sequence up to `max_retries` times, re-locating the window
/// before each attempt (handles are never trusted across a retry pause).
/// Exhaustion is reported as `Terminal` but is not fatal to the controller:
/// it keeps running with a partially un-styled window.
pub fn reconcile_with_retries(
    platform: &dyn Platform,
    clock: &dyn Clock,
    config: &Config,
    state: &ControllerState,
) -> Outcome {
    let mut last_error = None;
    for attempt in 1..=config.timings.max_retries {
        let outcome = match locator::locate(platform, &config.target) {
            Ok(Some(window)) => {
                state.set_target(Some(window));
                run_attempt(platform, clock, &config.timings, window)
            }
            Ok(None) => Outcome::Transient(PlatformError::WindowNotFound(
                config.target.process_name.clone(),
            )),
            // handle-enumeration errors are the one thing that propagates
            Err(e) => return Outcome::Terminal(e),
        };
        match outcome {
            Outcome::Success => {
                info!(attempt, "window reconciled");
                return Outcome::Success;
            }
            Outcome::Transient(e) => {
                state.bump_retries();
                warn!(attempt, error = %e, "reconcile attempt failed");
                platform.notify(
                    "MateKeeper",
                    &format!("Window setup failed (attempt {attempt}), retrying..."),
                );
                last_error = Some(e);
                if attempt < config.timings.max_retries {
                    clock.sleep(config.timings.retry_pause());
                }
            }
            terminal @ Outcome::Terminal(_) => return terminal,
        }
    }
    Outcome::Terminal(last_error.unwrap_or(PlatformError::WindowNotFound(
        config.target.process_name.clone(),
    )))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ops::fake::{FakeClock, FakePlatform, FakeWindow};
    use crate::ops::EX_LAYERED;

    const TARGET: WindowHandle = WindowHandle(0x2a);

    fn platform_with_target() -> FakePlatform {
        let platform = FakePlatform::new();
        platform.add_window(FakeWindow::new(
            TARGET.0,
            "UnityWndClass",
            "DesktopMate",
            "DesktopMate.exe",
        ));
        platform.add_window(FakeWindow::new(0x1, "Progman", "", "explorer.exe"));
        platform
    }

    fn set_window(platform: &FakePlatform, f: impl FnOnce(&mut FakeWindow)) {
        if let Some(w) = platform
            .windows
            .borrow_mut()
            .iter_mut()
            .find(|w| w.handle == TARGET.0)
        {
            f(w);
        }
    }

    #[test]
    fn stale_handle_is_a_transient_failure_not_a_panic() {
        let platform = FakePlatform::new();
        let clock = FakeClock::new();

        let outcome = run_attempt(&platform, &clock, &Timings::default(), WindowHandle(0xdead));

        assert!(matches!(
            outcome,
            Outcome::Transient(PlatformError::WindowGone(0xdead))
        ));
        assert_eq!(clock.sleep_count(), 0);
    }

    #[test]
    fn successful_attempt_stages_style_bits_in_order() {
        let platform = platform_with_target();
        let clock = FakeClock::new();

        let outcome = run_attempt(&platform, &clock, &Timings::default(), TARGET);

        assert!(outcome.is_success());
        let styles = platform.calls_with_prefix("set_ex_style");
        // clear APPWINDOW, add TOOLWINDOW, add NOACTIVATE, final re-assert
        assert_eq!(
            styles,
            vec![
                format!("set_ex_style {:#x} {:#x}", TARGET.0, 0u32),
                format!("set_ex_style {:#x} {:#x}", TARGET.0, EX_TOOLWINDOW),
                format!("set_ex_style {:#x} {:#x}", TARGET.0, EX_TOOLWINDOW | EX_NOACTIVATE),
                format!("set_ex_style {:#x} {:#x}", TARGET.0, EX_TOOLWINDOW | EX_NOACTIVATE),
            ]
        );
        // style staging happens before re-parenting
        let first_style = platform.call_index("set_ex_style").unwrap();
        let reparent = platform.call_index("set_parent").unwrap();
        assert!(first_style < reparent);
        // and the window ends up under the desktop anchor, shown non-activating
        assert_eq!(platform.window_parent(TARGET), Some(WindowHandle(0x1)));
        assert!(platform.call_index("show_na").unwrap() > reparent);
    }

    #[test]
    fn minimized_window_is_restored_first() {
        let platform = platform_with_target();
        set_window(&platform, |w| w.minimized = true);
        let clock = FakeClock::new();

        let outcome = run_attempt(&platform, &clock, &Timings::default(), TARGET);

        assert!(outcome.is_success());
        let restore = platform.call_index("restore").unwrap();
        let show = platform.call_index("show").unwrap();
        assert!(restore < show);
        assert!(!platform.is_minimized(TARGET));
    }

    #[test]
    fn activation_polling_stops_once_the_window_is_foreground() {
        let platform = platform_with_target();
        set_window(&platform, |w| w.foreground_after = 2);
        let clock = FakeClock::new();

        let outcome = run_attempt(&platform, &clock, &Timings::default(), TARGET);

        assert!(outcome.is_success());
        // foreground on the second poll, so the third is never issued
        assert_eq!(platform.calls_with_prefix("activate").len(), 2);
    }

    #[test]
    fn stubborn_foreground_refusal_does_not_fail_the_attempt() {
        let platform = platform_with_target();
        set_window(&platform, |w| w.foreground_after = 100);
        let clock = FakeClock::new();

        assert!(run_attempt(&platform, &clock, &Timings::default(), TARGET).is_success());
        // the full bound was spent before giving up
        assert_eq!(platform.calls_with_prefix("activate").len(), 3);
    }

    #[test]
    fn transient_reparent_failures_are_retried_within_the_attempt() {
        let platform = platform_with_target();
        platform.set_parent_failures.set(2);
        let clock = FakeClock::new();

        let outcome = run_attempt(&platform, &clock, &Timings::default(), TARGET);

        assert!(outcome.is_success());
        assert_eq!(platform.calls_with_prefix("set_parent").len(), 3);
    }

    #[test]
    fn persistent_reparent_failure_fails_the_attempt() {
        let platform = platform_with_target();
        platform.set_parent_failures.set(u32::MAX);
        let clock = FakeClock::new();

        let outcome = run_attempt(&platform, &clock, &Timings::default(), TARGET);

        assert!(matches!(outcome, Outcome::Transient(PlatformError::Call { .. })));
    }

    #[test]
    fn missing_desktop_anchor_fails_the_attempt_normally() {
        let platform = FakePlatform::new();
        platform.add_window(FakeWindow::new(
            TARGET.0,
            "UnityWndClass",
            "DesktopMate",
            "DesktopMate.exe",
        ));
        let clock = FakeClock::new();

        let outcome = run_attempt(&platform, &clock, &Timings::default(), TARGET);

        assert!(matches!(
            outcome,
            Outcome::Transient(PlatformError::NoDesktopAnchor)
        ));
    }

    #[test]
    fn layered_windows_get_full_opacity() {
        let platform = platform_with_target();
        set_window(&platform, |w| w.ex_style |= EX_LAYERED);
        let clock = FakeClock::new();

        assert!(run_attempt(&platform, &clock, &Timings::default(), TARGET).is_success());
        assert!(platform.call_index("opacity").is_some());
    }

    #[test]
    fn retry_loop_is_bounded_and_paced() {
        // window never appears: every attempt fails before any OS mutation
        let platform = FakePlatform::new();
        let clock = FakeClock::new();
        let config = Config::default();
        let state = ControllerState::new();

        let outcome = reconcile_with_retries(&platform, &clock, &config, &state);

        assert!(matches!(
            outcome,
            Outcome::Terminal(PlatformError::WindowNotFound(_))
        ));
        assert_eq!(state.retries(), 3);
        // attempts are separated by the configured pause: N attempts, N-1 pauses
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2); 2]);
        // each failed attempt surfaced a user-visible warning
        assert_eq!(platform.calls_with_prefix("notify").len(), 3);
    }

    #[test]
    fn retry_loop_stops_on_first_success() {
        let platform = platform_with_target();
        let clock = FakeClock::new();
        let config = Config::default();
        let state = ControllerState::new();

        let outcome = reconcile_with_retries(&platform, &clock, &config, &state);

        assert!(outcome.is_success());
        assert_eq!(state.retries(), 0);
        assert_eq!(state.target_handle(), Some(TARGET));
    }

    #[test]
    fn second_attempt_can_succeed_after_a_transient_failure() {
        let platform = platform_with_target();
        platform.set_parent_failures.set(3); // sinks exactly the first attempt
        let clock = FakeClock::new();
        let config = Config::default();
        let state = ControllerState::new();

        let outcome = reconcile_with_retries(&platform, &clock, &config, &state);

        assert!(outcome.is_success());
        assert_eq!(state.retries(), 1);
    }

    #[test]
    fn enumeration_errors_escalate_to_terminal() {
        let platform = FakePlatform::new();
        platform.enum_error.set(true);
        let clock = FakeClock::new();
        let config = Config::default();
        let state = ControllerState::new();

        let outcome = reconcile_with_retries(&platform, &clock, &config, &state);

        assert!(matches!(
            outcome,
            Outcome::Terminal(PlatformError::Enumeration(_))
        ));
        // no retry pause was spent on it
        assert_eq!(clock.sleep_count(), 0);
    }
}
