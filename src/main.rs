// MateKeeper — keeps DesktopMate on the desktop and off the taskbar
// SPDX-License-Identifier: AGPL-3.0-or-later

#![cfg_attr(windows, windows_subsystem = "windows")]

#[cfg(windows)]
fn main() {
    std::process::exit(app::run());
}

#[cfg(not(windows))]
fn main() {
    eprintln!("matekeeper supervises a Windows desktop application; nothing to do here");
    std::process::exit(1);
}

#[cfg(windows)]
mod app {
    use std::mem;
    use std::sync::OnceLock;

    use matekeeper::config::{self, Config};
    use matekeeper::error::Outcome;
    use matekeeper::logging;
    use matekeeper::ops::{Platform, SystemClock};
    use matekeeper::reconcile;
    use matekeeper::supervisor::{self, ControllerState};
    use matekeeper::tray::{self, IDM_EXIT, IDM_RESTART, WM_TRAYICON};
    use matekeeper::win32::Win32Platform;
    use tracing::{error, info, warn};
    use windows::core::w;
    use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::UI::WindowsAndMessaging::{
        CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, FindWindowW,
        GetMessageW, KillTimer, PostQuitMessage, RegisterClassExW, SetTimer, TranslateMessage,
        HMENU, MSG, WINDOW_EX_STYLE, WM_COMMAND, WM_DESTROY, WM_TIMER, WNDCLASSEXW, WS_POPUP,
    };

    const MONITOR_TIMER: usize = 1;

    struct Controller {
        config: Config,
        state: ControllerState,
        platform: Win32Platform,
        clock: SystemClock,
    }

    static CONTROLLER: OnceLock<Controller> = OnceLock::new();

    unsafe extern "system" fn wndproc(hwnd: HWND, msg: u32, wp: WPARAM, lp: LPARAM) -> LRESULT {
        let Some(controller) = CONTROLLER.get() else {
            return DefWindowProcW(hwnd, msg, wp, lp);
        };
        match msg {
            WM_TIMER if wp.0 == MONITOR_TIMER => {
                if supervisor::monitor_tick(
                    &controller.platform,
                    &controller.config,
                    &controller.state,
                ) {
                    let _ = KillTimer(hwnd, MONITOR_TIMER);
                    let _ = DestroyWindow(hwnd);
                }
                LRESULT(0)
            }

            m if m == WM_TRAYICON => {
                let event = (lp.0 & 0xFFFF) as u32;
                // WM_RBUTTONUP = 0x0205, WM_LBUTTONUP = 0x0202
                if event == 0x0205 || event == 0x0202 {
                    tray::show_menu(hwnd);
                }
                LRESULT(0)
            }

            WM_COMMAND => {
                match (wp.0 & 0xFFFF) as u16 {
                    IDM_EXIT => {
                        supervisor::exit_target(
                            &controller.platform,
                            &controller.clock,
                            &controller.config,
                            &controller.state,
                        );
                        let _ = DestroyWindow(hwnd);
                    }
                    IDM_RESTART => {
                        supervisor::restart_target(
                            &controller.platform,
                            &controller.clock,
                            &controller.config,
                            &controller.state,
                        );
                        let _ = DestroyWindow(hwnd);
                    }
                    _ => {}
                }
                LRESULT(0)
            }

            WM_DESTROY => {
                tray::remove_tray_icon(hwnd);
                PostQuitMessage(0);
                LRESULT(0)
            }

            _ => DefWindowProcW(hwnd, msg, wp, lp),
        }
    }

    pub fn run() -> i32 {
        logging::init();
        let config = config::load();
        info!(target = %config.target.process_name, "matekeeper starting");

        unsafe {
            // single-instance guard: our window class is unique
            if let Ok(existing) = FindWindowW(w!("MateKeeper"), None) {
                if !existing.0.is_null() {
                    info!("another matekeeper instance is already running");
                    return 0;
                }
            }

            let Ok(module) = GetModuleHandleW(None) else {
                return 1;
            };
            let hinst: HINSTANCE = module.into();
            let wc = WNDCLASSEXW {
                cbSize: mem::size_of::<WNDCLASSEXW>() as u32,
                lpfnWndProc: Some(wndproc),
                hInstance: hinst,
                lpszClassName: w!("MateKeeper"),
                ..Default::default()
            };
            if RegisterClassExW(&wc) == 0 {
                error!("window class registration failed");
                return 1;
            }

            // hidden window owning the tray icon and the liveness timer
            let hwnd = match CreateWindowExW(
                WINDOW_EX_STYLE(0),
                w!("MateKeeper"),
                w!("MateKeeper"),
                WS_POPUP,
                0,
                0,
                0,
                0,
                HWND::default(),
                HMENU::default(),
                hinst,
                None,
            ) {
                Ok(h) => h,
                Err(e) => {
                    error!(error = %e, "tray window creation failed");
                    return 1;
                }
            };

            let controller = CONTROLLER.get_or_init(|| Controller {
                config,
                state: ControllerState::new(),
                platform: Win32Platform::new(),
                clock: SystemClock,
            });
            controller.platform.set_tray_window(hwnd.0 as isize);
            tray::add_tray_icon(hwnd);

            controller.platform.notify(
                "MateKeeper",
                &format!("Launching {}...", controller.config.target.process_name),
            );
            supervisor::launch(&controller.platform, &controller.config.target);

            let window = match supervisor::await_window(
                &controller.platform,
                &controller.clock,
                &controller.config,
            ) {
                Ok(Some(window)) => window,
                Ok(None) => {
                    error!("target window never appeared");
                    controller.platform.fatal_dialog(
                        "MateKeeper",
                        &format!(
                            "{} did not appear within {} seconds.",
                            controller.config.target.process_name,
                            controller.config.timings.max_wait_secs
                        ),
                    );
                    tray::remove_tray_icon(hwnd);
                    return 1;
                }
                Err(e) => {
                    error!(error = %e, "window lookup failed");
                    controller
                        .platform
                        .fatal_dialog("MateKeeper", &e.to_string());
                    tray::remove_tray_icon(hwnd);
                    return 1;
                }
            };
            controller.state.set_target(Some(window));

            match reconcile::reconcile_with_retries(
                &controller.platform,
                &controller.clock,
                &controller.config,
                &controller.state,
            ) {
                Outcome::Success => {
                    controller.state.set_hidden(true);
                    controller
                        .platform
                        .notify("MateKeeper", "DesktopMate is now living on your desktop");
                }
                Outcome::Transient(e) | Outcome::Terminal(e) => {
                    // presentation imperfection is not fatal
                    warn!(error = %e, "window left partially un-styled, continuing");
                    controller.platform.notify(
                        "MateKeeper",
                        "Could not fully configure the window, continuing anyway",
                    );
                }
            }

            let _ = SetTimer(
                hwnd,
                MONITOR_TIMER,
                controller.config.timings.monitor_period_ms as u32,
                None,
            );
            controller.state.set_monitor_active(true);

            let mut msg = MSG::default();
            while GetMessageW(&mut msg, None, 0, 0).into() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        info!("matekeeper exiting");
        0
    }
}
