//! Seams between the session state machine and the platform capture API.

use wgcap_core::{CaptureError, FrameSize, WindowInfo};

use crate::session::CaptureSession;

/// Outcome of trying to map a frame's texture for CPU reads.
pub enum MapResult<V> {
    /// The texture itself was mapped.
    Direct(V),
    /// The texture is not CPU-readable; copy it to a staging resource first.
    NeedsStaging,
}

/// A texture mapped for reading. Unmapped when dropped.
pub trait MappedView {
    /// Byte distance between the starts of consecutive rows.
    fn row_pitch(&self) -> usize;
    /// Dimensions of the mapped texture.
    fn extent(&self) -> FrameSize;
    /// The mapped rows; at least `row_pitch * (h - 1) + 4 * w` bytes.
    fn bytes(&self) -> &[u8];
}

/// One frame handed out by a frame pool.
pub trait CapturedFrame {
    type View<'a>: MappedView
    where
        Self: 'a;

    /// Size of the captured content, which may differ from the pool size.
    fn content_size(&self) -> Result<FrameSize, CaptureError>;

    fn map_direct(&self) -> Result<MapResult<Self::View<'_>>, CaptureError>;

    /// Copy into a CPU-readable staging texture and map that.
    fn map_staged(&self) -> Result<Self::View<'_>, CaptureError>;
}

/// The platform objects behind one capture session: frame pool, swap chain,
/// OS capture session and the capture target.
pub trait CaptureBackend {
    type Frame: CapturedFrame;

    fn start(&mut self) -> Result<(), CaptureError>;

    /// `Ok(None)` when nothing is queued. Never blocks.
    fn try_next_frame(&mut self) -> Result<Option<Self::Frame>, CaptureError>;

    /// Rebuild the frame pool for `size`, same device and pixel format.
    fn recreate_pool(&mut self, size: FrameSize) -> Result<(), CaptureError>;

    /// Release every platform resource.
    fn close(self);
}

/// Owner of the shared graphics device; lists windows and opens sessions.
pub trait CaptureHost {
    type Backend: CaptureBackend;

    fn enumerate_windows(&self) -> Result<Vec<WindowInfo>, CaptureError>;

    /// Resolve `window_id` and bind a new, not yet started, session to it.
    fn open_session(&self, window_id: u64) -> Result<CaptureSession<Self::Backend>, CaptureError>;
}
