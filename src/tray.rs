// MateKeeper — keeps DesktopMate on the desktop and off the taskbar
// SPDX-License-Identifier: AGPL-3.0-or-later

//! System tray icon, popup menu and balloon notifications.

use tracing::debug;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HINSTANCE, HWND, POINT};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Shell::{
    Shell_NotifyIconW, NIF_ICON, NIF_INFO, NIF_MESSAGE, NIF_TIP, NIIF_INFO, NIM_ADD, NIM_DELETE,
    NIM_MODIFY, NOTIFYICONDATAW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CreatePopupMenu, DestroyMenu, GetCursorPos, InsertMenuW, LoadIconW, LoadImageW,
    SetForegroundWindow, TrackPopupMenu, HICON, IDI_APPLICATION, IMAGE_ICON, LR_DEFAULTCOLOR,
    MF_SEPARATOR, MF_STRING, TPM_BOTTOMALIGN, TPM_LEFTALIGN,
};

pub const WM_TRAYICON: u32 = 0x0400 + 50; // WM_APP + 50
pub const TRAY_ID: u32 = 1;
pub const IDM_RESTART: u16 = 1001;
pub const IDM_EXIT: u16 = 1002;

fn fill_wide(dst: &mut [u16], src: &str) {
    let wide: Vec<u16> = src.encode_utf16().collect();
    let n = wide.len().min(dst.len().saturating_sub(1));
    dst[..n].copy_from_slice(&wide[..n]);
    dst[n] = 0;
}

pub fn add_tray_icon(hwnd: HWND) {
    unsafe {
        let mut nid: NOTIFYICONDATAW = std::mem::zeroed();
        nid.cbSize = std::mem::size_of::<NOTIFYICONDATAW>() as u32;
        nid.hWnd = hwnd;
        nid.uID = TRAY_ID;
        nid.uFlags = NIF_MESSAGE | NIF_ICON | NIF_TIP;
        nid.uCallbackMessage = WM_TRAYICON;
        // embedded exe icon (resource ID 1 from winresource), system icon as
        // the cosmetic fallback
        let hinst = GetModuleHandleW(PCWSTR::null()).unwrap_or_default();
        let icon = LoadImageW(
            hinst,
            PCWSTR(1 as *const u16),
            IMAGE_ICON,
            16,
            16,
            LR_DEFAULTCOLOR,
        );
        nid.hIcon = match icon {
            Ok(h) => HICON(h.0),
            Err(_) => LoadIconW(HINSTANCE::default(), IDI_APPLICATION).unwrap_or_default(),
        };
        fill_wide(&mut nid.szTip, "MateKeeper");
        let _ = Shell_NotifyIconW(NIM_ADD, &nid);
        debug!("tray icon added");
    }
}

pub fn remove_tray_icon(hwnd: HWND) {
    unsafe {
        let mut nid: NOTIFYICONDATAW = std::mem::zeroed();
        nid.cbSize = std::mem::size_of::<NOTIFYICONDATAW>() as u32;
        nid.hWnd = hwnd;
        nid.uID = TRAY_ID;
        let _ = Shell_NotifyIconW(NIM_DELETE, &nid);
    }
}

/// Transient balloon over the tray icon. Best-effort feedback, never affects
/// control flow.
pub fn balloon(hwnd: HWND, title: &str, body: &str) {
    unsafe {
        let mut nid: NOTIFYICONDATAW = std::mem::zeroed();
        nid.cbSize = std::mem::size_of::<NOTIFYICONDATAW>() as u32;
        nid.hWnd = hwnd;
        nid.uID = TRAY_ID;
        nid.uFlags = NIF_INFO;
        nid.dwInfoFlags = NIIF_INFO;
        fill_wide(&mut nid.szInfoTitle, title);
        fill_wide(&mut nid.szInfo, body);
        let _ = Shell_NotifyIconW(NIM_MODIFY, &nid);
    }
}

pub fn show_menu(hwnd: HWND) {
    unsafe {
        let Ok(menu) = CreatePopupMenu() else {
            return;
        };
        let restart: Vec<u16> = "Restart DesktopMate\0".encode_utf16().collect();
        let separator: Vec<u16> = "\0".encode_utf16().collect();
        let exit: Vec<u16> = "Exit DesktopMate\0".encode_utf16().collect();

        let _ = InsertMenuW(menu, 0, MF_STRING, IDM_RESTART as usize, PCWSTR(restart.as_ptr()));
        let _ = InsertMenuW(menu, 1, MF_SEPARATOR, 0, PCWSTR(separator.as_ptr()));
        let _ = InsertMenuW(menu, 2, MF_STRING, IDM_EXIT as usize, PCWSTR(exit.as_ptr()));

        // menu will not dismiss on focus loss without this
        let _ = SetForegroundWindow(hwnd);
        let mut pt = POINT::default();
        let _ = GetCursorPos(&mut pt);
        let _ = TrackPopupMenu(menu, TPM_LEFTALIGN | TPM_BOTTOMALIGN, pt.x, pt.y, 0, hwnd, None);
        let _ = DestroyMenu(menu);
    }
}
