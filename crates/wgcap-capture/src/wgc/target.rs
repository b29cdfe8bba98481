//! Capture Item Resolver: window handle → `GraphicsCaptureItem`.

use std::ffi::c_void;

use tracing::info;
use windows::Graphics::Capture::GraphicsCaptureItem;
use windows::Win32::Foundation::HWND;
use windows::Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop;
use windows::Win32::UI::WindowsAndMessaging::IsWindow;
use wgcap_core::{CaptureError, FrameSize};

use super::{platform_err, to_frame_size};

/// What to capture: one window's capture item and its size at resolution time.
pub struct CaptureTarget {
    pub(crate) item: GraphicsCaptureItem,
    window_id: u64,
    size: FrameSize,
}

impl CaptureTarget {
    pub fn for_window(window_id: u64) -> Result<Self, CaptureError> {
        let invalid = |reason: String| CaptureError::InvalidTarget { window_id, reason };

        let raw = usize::try_from(window_id).map_err(|_| invalid("handle out of range".to_owned()))?;
        let hwnd = HWND(raw as *mut c_void);
        if hwnd.is_invalid() || !unsafe { IsWindow(hwnd) }.as_bool() {
            return Err(invalid("not a live window".to_owned()));
        }

        let interop = windows::core::factory::<GraphicsCaptureItem, IGraphicsCaptureItemInterop>()
            .map_err(platform_err("IGraphicsCaptureItemInterop factory"))?;
        let item: GraphicsCaptureItem = unsafe { interop.CreateForWindow(hwnd) }
            .map_err(|e| invalid(format!("CreateForWindow: {e}")))?;
        let size = item
            .Size()
            .map(to_frame_size)
            .map_err(platform_err("GraphicsCaptureItem::Size"))?;

        info!("Window {} resolved, item size {}", window_id, size);
        Ok(Self { item, window_id, size })
    }

    pub fn window_id(&self) -> u64 {
        self.window_id
    }

    pub fn size(&self) -> FrameSize {
        self.size
    }
}
