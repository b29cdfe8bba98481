//! Windows.Graphics.Capture (WGC) implementation.
//!
//! Requires Windows 10 1903+ (build 18362) for `CreateForWindow` and the
//! `windows` crate with WGC features.
//!
//! # Threading model
//!
//! The frame pool is created free-threaded and polled with `TryGetNextFrame`
//! from the command thread, so no `FrameArrived` handler or dispatcher queue
//! is involved. The immediate context is only touched from that thread while
//! a single session is active.

mod backend;
mod device;
mod target;
mod windows_enum;

pub use backend::WgcBackend;
pub use device::GraphicsDevice;
pub use target::CaptureTarget;

use windows::Graphics::SizeInt32;
use wgcap_core::{CaptureError, FrameSize, WindowInfo};

use crate::backend::CaptureHost;
use crate::session::CaptureSession;

impl CaptureHost for GraphicsDevice {
    type Backend = WgcBackend;

    fn enumerate_windows(&self) -> Result<Vec<WindowInfo>, CaptureError> {
        windows_enum::enumerate_windows()
    }

    fn open_session(&self, window_id: u64) -> Result<CaptureSession<WgcBackend>, CaptureError> {
        let target = CaptureTarget::for_window(window_id)?;
        let size = target.size();
        let backend = WgcBackend::new(self, target)?;
        Ok(CaptureSession::new(backend, size))
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Wrap a failed OS call as [`CaptureError::Platform`].
fn platform_err(call: &'static str) -> impl Fn(windows::core::Error) -> CaptureError {
    move |e| CaptureError::Platform { call, reason: e.to_string() }
}

/// Wrap a failed OS call on the frame read path as [`CaptureError::FrameMap`].
fn frame_map_err(call: &'static str) -> impl Fn(windows::core::Error) -> CaptureError {
    move |e| CaptureError::FrameMap { reason: format!("{call}: {e}") }
}

fn to_frame_size(size: SizeInt32) -> FrameSize {
    FrameSize::new(size.Width.max(0) as u32, size.Height.max(0) as u32)
}

fn to_size_int32(size: FrameSize) -> SizeInt32 {
    SizeInt32 {
        Width: i32::try_from(size.width).unwrap_or(i32::MAX),
        Height: i32::try_from(size.height).unwrap_or(i32::MAX),
    }
}
