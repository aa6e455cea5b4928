// MateKeeper — keeps DesktopMate on the desktop and off the taskbar
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Win32 implementation of the platform seam.

use std::process::Command;
use std::sync::atomic::{AtomicIsize, Ordering::SeqCst};

use sysinfo::{ProcessesToUpdate, System};
use tracing::{info, warn};
use windows::core::{w, HSTRING, PCWSTR, PWSTR};
use windows::Win32::Foundation::{CloseHandle, BOOL, COLORREF, FALSE, HWND, LPARAM, TRUE, WPARAM};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_FORMAT,
    PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::Shell::ShellExecuteW;
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, FindWindowW, GetClassNameW, GetForegroundWindow, GetParent, GetWindowLongW,
    GetWindowThreadProcessId, IsIconic, IsWindow, IsWindowVisible, MessageBoxW, PostMessageW,
    SetForegroundWindow, SetLayeredWindowAttributes, SetParent, SetWindowLongW, ShowWindow,
    GWL_EXSTYLE, LWA_ALPHA, MB_ICONERROR, MB_OK, SW_RESTORE, SW_SHOW, SW_SHOWNA, SW_SHOWNORMAL,
    WM_CLOSE,
};

use crate::error::PlatformError;
use crate::ops::{Platform, WindowHandle, EX_LAYERED};

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

pub struct Win32Platform {
    /// Window owning the tray icon; 0 until the tray exists. Balloons before
    /// that point fall back to the log.
    tray_window: AtomicIsize,
}

impl Win32Platform {
    pub fn new() -> Self {
        Self {
            tray_window: AtomicIsize::new(0),
        }
    }

    pub fn set_tray_window(&self, hwnd: isize) {
        self.tray_window.store(hwnd, SeqCst);
    }

    fn hwnd(window: WindowHandle) -> HWND {
        HWND(window.0 as *mut _)
    }
}

impl Default for Win32Platform {
    fn default() -> Self {
        Self::new()
    }
}

unsafe extern "system" fn enum_windows_cb(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let vec = &mut *(lparam.0 as *mut Vec<isize>);
    vec.push(hwnd.0 as isize);
    TRUE
}

impl Platform for Win32Platform {
    fn find_window(&self, class: Option<&str>, title: Option<&str>) -> Option<WindowHandle> {
        let class_w = class.map(wide);
        let title_w = title.map(wide);
        let class_p = class_w
            .as_deref()
            .map_or(PCWSTR::null(), |v| PCWSTR(v.as_ptr()));
        let title_p = title_w
            .as_deref()
            .map_or(PCWSTR::null(), |v| PCWSTR(v.as_ptr()));
        match unsafe { FindWindowW(class_p, title_p) } {
            Ok(h) if !h.0.is_null() => Some(WindowHandle(h.0 as isize)),
            _ => None,
        }
    }

    fn list_windows(&self) -> Result<Vec<WindowHandle>, PlatformError> {
        let mut raw: Vec<isize> = Vec::new();
        unsafe {
            EnumWindows(
                Some(enum_windows_cb),
                LPARAM(&mut raw as *mut Vec<isize> as isize),
            )
        }
        .map_err(|e| PlatformError::Enumeration(e.to_string()))?;
        Ok(raw.into_iter().map(WindowHandle).collect())
    }

    fn window_exists(&self, window: WindowHandle) -> bool {
        unsafe { IsWindow(Self::hwnd(window)) }.as_bool()
    }

    fn is_visible(&self, window: WindowHandle) -> bool {
        unsafe { IsWindowVisible(Self::hwnd(window)) }.as_bool()
    }

    fn is_minimized(&self, window: WindowHandle) -> bool {
        unsafe { IsIconic(Self::hwnd(window)) }.as_bool()
    }

    fn is_foreground(&self, window: WindowHandle) -> bool {
        unsafe { GetForegroundWindow() } == Self::hwnd(window)
    }

    fn class_name(&self, window: WindowHandle) -> Option<String> {
        let mut buf = [0u16; 256];
        let len = unsafe { GetClassNameW(Self::hwnd(window), &mut buf) };
        if len > 0 {
            Some(String::from_utf16_lossy(&buf[..len as usize]))
        } else {
            None
        }
    }

    fn exe_name(&self, window: WindowHandle) -> Option<String> {
        let mut pid: u32 = 0;
        unsafe { GetWindowThreadProcessId(Self::hwnd(window), Some(&mut pid)) };
        if pid == 0 {
            return None;
        }
        let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, FALSE, pid) }.ok()?;
        let mut buf = [0u16; 260];
        let mut len = buf.len() as u32;
        let queried = unsafe {
            QueryFullProcessImageNameW(
                handle,
                PROCESS_NAME_FORMAT(0),
                PWSTR(buf.as_mut_ptr()),
                &mut len,
            )
        };
        unsafe {
            let _ = CloseHandle(handle);
        }
        if queried.is_ok() {
            let path = String::from_utf16_lossy(&buf[..len as usize]);
            path.rsplit('\\').next().map(str::to_string)
        } else {
            None
        }
    }

    fn show(&self, window: WindowHandle) {
        unsafe {
            let _ = ShowWindow(Self::hwnd(window), SW_SHOW);
        }
    }

    fn show_no_activate(&self, window: WindowHandle) {
        unsafe {
            let _ = ShowWindow(Self::hwnd(window), SW_SHOWNA);
        }
    }

    fn restore(&self, window: WindowHandle) {
        unsafe {
            let _ = ShowWindow(Self::hwnd(window), SW_RESTORE);
        }
    }

    fn activate(&self, window: WindowHandle) -> bool {
        unsafe { SetForegroundWindow(Self::hwnd(window)) }.as_bool()
    }

    fn set_full_opacity(&self, window: WindowHandle) -> Result<(), PlatformError> {
        // only layered windows carry an alpha; everything else is already opaque
        if self.ex_style(window)? & EX_LAYERED == 0 {
            return Ok(());
        }
        unsafe { SetLayeredWindowAttributes(Self::hwnd(window), COLORREF(0), 255, LWA_ALPHA) }
            .map_err(|e| PlatformError::Call {
                call: "SetLayeredWindowAttributes",
                detail: e.to_string(),
            })
    }

    fn ex_style(&self, window: WindowHandle) -> Result<u32, PlatformError> {
        Ok(unsafe { GetWindowLongW(Self::hwnd(window), GWL_EXSTYLE) } as u32)
    }

    fn set_ex_style(&self, window: WindowHandle, style: u32) -> Result<(), PlatformError> {
        unsafe { SetWindowLongW(Self::hwnd(window), GWL_EXSTYLE, style as i32) };
        Ok(())
    }

    fn set_window_parent(
        &self,
        window: WindowHandle,
        parent: WindowHandle,
    ) -> Result<(), PlatformError> {
        unsafe { SetParent(Self::hwnd(window), Self::hwnd(parent)) }
            .map(|_| ())
            .map_err(|e| PlatformError::Call {
                call: "SetParent",
                detail: e.to_string(),
            })
    }

    fn window_parent(&self, window: WindowHandle) -> Option<WindowHandle> {
        match unsafe { GetParent(Self::hwnd(window)) } {
            Ok(h) if !h.0.is_null() => Some(WindowHandle(h.0 as isize)),
            _ => None,
        }
    }

    fn post_close(&self, window: WindowHandle) {
        unsafe {
            let _ = PostMessageW(Self::hwnd(window), WM_CLOSE, WPARAM(0), LPARAM(0));
        }
    }

    fn launch_uri(&self, uri: &str) {
        let uri_w = wide(uri);
        let result = unsafe {
            ShellExecuteW(
                HWND::default(),
                w!("open"),
                PCWSTR(uri_w.as_ptr()),
                PCWSTR::null(),
                PCWSTR::null(),
                SW_SHOWNORMAL,
            )
        };
        // <= 32 signals failure, but the launcher gives no reliable success
        // signal either way; we always proceed to wait for the window
        if result.0 as isize <= 32 {
            warn!(uri, code = result.0 as isize, "ShellExecuteW reported failure");
        }
    }

    fn process_running(&self, exe: &str) -> bool {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        system
            .processes()
            .values()
            .any(|p| p.name().eq_ignore_ascii_case(exe))
    }

    fn kill_processes_named(&self, exe: &str) -> usize {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        let mut killed = 0;
        for process in system.processes().values() {
            if process.name().eq_ignore_ascii_case(exe) && process.kill() {
                info!(pid = process.pid().as_u32(), exe, "process killed");
                killed += 1;
            }
        }
        killed
    }

    fn spawn_controller(&self) -> Result<(), PlatformError> {
        let exe = std::env::current_exe().map_err(|e| PlatformError::Spawn(e.to_string()))?;
        Command::new(exe)
            .spawn()
            .map_err(|e| PlatformError::Spawn(e.to_string()))?;
        Ok(())
    }

    fn notify(&self, title: &str, body: &str) {
        let tray = self.tray_window.load(SeqCst);
        if tray != 0 {
            crate::tray::balloon(HWND(tray as *mut _), title, body);
        }
        info!(title, body, "notify");
    }

    fn fatal_dialog(&self, title: &str, body: &str) {
        unsafe {
            MessageBoxW(
                HWND::default(),
                &HSTRING::from(body),
                &HSTRING::from(title),
                MB_OK | MB_ICONERROR,
            );
        }
    }
}
