//! Non-Windows stub (CI + cross-compilation). No device can be created, so no
//! session can ever exist; the backend type is uninhabited.

use tracing::info;
use wgcap_core::{CaptureError, FrameSize, WindowInfo};

use crate::backend::{CaptureBackend, CaptureHost, CapturedFrame, MapResult, MappedView};
use crate::session::CaptureSession;

const UNSUPPORTED: &str = "Windows.Graphics.Capture requires Windows 10 1903 or later";

pub struct GraphicsDevice {
    _private: (),
}

impl GraphicsDevice {
    pub fn create() -> Result<Self, CaptureError> {
        info!("GraphicsDevice::create stub (non-Windows)");
        Err(CaptureError::DeviceCreation { reason: UNSUPPORTED.to_owned() })
    }
}

pub struct CaptureTarget {
    never: UnsupportedBackend,
}

impl CaptureTarget {
    pub fn for_window(window_id: u64) -> Result<Self, CaptureError> {
        Err(CaptureError::InvalidTarget { window_id, reason: UNSUPPORTED.to_owned() })
    }

    pub fn window_id(&self) -> u64 {
        match self.never {}
    }

    pub fn size(&self) -> FrameSize {
        match self.never {}
    }
}

impl CaptureHost for GraphicsDevice {
    type Backend = UnsupportedBackend;

    fn enumerate_windows(&self) -> Result<Vec<WindowInfo>, CaptureError> {
        Ok(Vec::new())
    }

    fn open_session(&self, window_id: u64) -> Result<CaptureSession<UnsupportedBackend>, CaptureError> {
        CaptureTarget::for_window(window_id).map(|target| match target.never {})
    }
}

/// Backend, frame and view type that cannot be constructed.
pub enum UnsupportedBackend {}

impl CaptureBackend for UnsupportedBackend {
    type Frame = UnsupportedBackend;

    fn start(&mut self) -> Result<(), CaptureError> {
        match *self {}
    }

    fn try_next_frame(&mut self) -> Result<Option<Self::Frame>, CaptureError> {
        match *self {}
    }

    fn recreate_pool(&mut self, _size: FrameSize) -> Result<(), CaptureError> {
        match *self {}
    }

    fn close(self) {
        match self {}
    }
}

impl CapturedFrame for UnsupportedBackend {
    type View<'a> = UnsupportedBackend;

    fn content_size(&self) -> Result<FrameSize, CaptureError> {
        match *self {}
    }

    fn map_direct(&self) -> Result<MapResult<UnsupportedBackend>, CaptureError> {
        match *self {}
    }

    fn map_staged(&self) -> Result<UnsupportedBackend, CaptureError> {
        match *self {}
    }
}

impl MappedView for UnsupportedBackend {
    fn row_pitch(&self) -> usize {
        match *self {}
    }

    fn extent(&self) -> FrameSize {
        match *self {}
    }

    fn bytes(&self) -> &[u8] {
        match *self {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_creation_is_refused() {
        let err = GraphicsDevice::create().err().expect("stub never creates a device");
        assert!(matches!(err, CaptureError::DeviceCreation { .. }));
        assert!(matches!(
            CaptureTarget::for_window(42).err(),
            Some(CaptureError::InvalidTarget { window_id: 42, .. })
        ));
    }
}
