//! wgcap-capture — window capture through Windows.Graphics.Capture (WGC).
//!
//! On non-Windows targets a stub is compiled that refuses to create a device,
//! so the rest of the workspace still builds and tests.
//!
//! # Windows pipeline
//!
//! ```text
//! D3D11CreateDevice (hardware, WARP on DXGI_ERROR_UNSUPPORTED)
//!   │  CreateDirect3D11DeviceFromDXGIDevice
//!   ▼
//! GraphicsDevice ──── shared by every session, never recreated
//!   │  IGraphicsCaptureItemInterop::CreateForWindow(HWND)
//!   ▼
//! CaptureTarget (GraphicsCaptureItem)
//!   │  Direct3D11CaptureFramePool::CreateFreeThreaded (BGRA8, 2 buffers)
//!   ▼
//! CaptureSession::try_pull_frame()  ── non-blocking poll
//!   │  Map(texture) or CopyResource → staging texture → Map
//!   ▼
//! PixelBuffer (packed BGRA8, CPU-side)
//! ```

pub mod backend;
pub mod session;

pub use backend::{CaptureBackend, CaptureHost, CapturedFrame, MapResult, MappedView};
pub use session::CaptureSession;
pub use wgcap_core::{CaptureError, FrameSize, PixelBuffer, WindowInfo};

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// ── Platform split ─────────────────────────────────────────────────────────────

#[cfg(target_os = "windows")]
mod wgc;
#[cfg(target_os = "windows")]
pub use wgc::{CaptureTarget, GraphicsDevice, WgcBackend};

#[cfg(not(target_os = "windows"))]
mod stub;
#[cfg(not(target_os = "windows"))]
pub use stub::{CaptureTarget, GraphicsDevice, UnsupportedBackend};
