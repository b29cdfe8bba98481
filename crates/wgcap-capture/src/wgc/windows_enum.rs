//! Top-level window enumeration for `enum_windows`.
//!
//! Keeps windows a user would recognise as capturable: visible, root-owned,
//! enabled, titled, not tool windows and not cloaked by DWM.

use std::ffi::c_void;

use tracing::debug;
use windows::Win32::Foundation::{BOOL, HWND, LPARAM};
use windows::Win32::Graphics::Dwm::{DwmGetWindowAttribute, DWMWA_CLOAKED};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetAncestor, GetClassNameW, GetWindowLongW, GetWindowTextLengthW,
    GetWindowTextW, IsWindowVisible, GA_ROOT, GWL_EXSTYLE, GWL_STYLE, WS_DISABLED,
    WS_EX_TOOLWINDOW,
};
use wgcap_core::{CaptureError, WindowInfo};

use super::platform_err;

/// Shell-owned windows that report as visible but cannot be captured usefully.
const IGNORED_CLASSES: &[&str] = &["Progman", "Windows.UI.Core.CoreWindow", "Shell_TrayWnd"];

pub(super) fn enumerate_windows() -> Result<Vec<WindowInfo>, CaptureError> {
    let mut list: Vec<WindowInfo> = Vec::new();

    unsafe extern "system" fn cb(hwnd: HWND, data: LPARAM) -> BOOL {
        let list = data.0 as *mut Vec<WindowInfo>;
        if let Some(title) = capturable_title(hwnd) {
            unsafe { (*list).push(WindowInfo::new(hwnd.0 as usize as u64, title)) };
        }
        BOOL(1)
    }

    unsafe { EnumWindows(Some(cb), LPARAM(&mut list as *mut _ as isize)) }
        .map_err(platform_err("EnumWindows"))?;

    debug!("Enumerated {} capturable windows", list.len());
    Ok(list)
}

fn capturable_title(hwnd: HWND) -> Option<String> {
    unsafe {
        if !IsWindowVisible(hwnd).as_bool() || GetAncestor(hwnd, GA_ROOT) != hwnd {
            return None;
        }

        let style = GetWindowLongW(hwnd, GWL_STYLE) as u32;
        let ex_style = GetWindowLongW(hwnd, GWL_EXSTYLE) as u32;
        if style & WS_DISABLED.0 != 0 || ex_style & WS_EX_TOOLWINDOW.0 != 0 {
            return None;
        }

        if is_cloaked(hwnd) {
            return None;
        }

        let mut class = [0u16; 256];
        let class_len = GetClassNameW(hwnd, &mut class).max(0) as usize;
        let class = String::from_utf16_lossy(&class[..class_len]);
        if IGNORED_CLASSES.contains(&class.as_str()) {
            return None;
        }

        let len = GetWindowTextLengthW(hwnd);
        if len <= 0 {
            return None;
        }
        let mut title = vec![0u16; len as usize + 1];
        let copied = GetWindowTextW(hwnd, &mut title).max(0) as usize;
        if copied == 0 {
            return None;
        }
        Some(String::from_utf16_lossy(&title[..copied]))
    }
}

fn is_cloaked(hwnd: HWND) -> bool {
    let mut cloaked: u32 = 0;
    let result = unsafe {
        DwmGetWindowAttribute(
            hwnd,
            DWMWA_CLOAKED,
            &mut cloaked as *mut u32 as *mut c_void,
            std::mem::size_of::<u32>() as u32,
        )
    };
    result.is_ok() && cloaked != 0
}
