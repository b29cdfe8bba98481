//! Capture session state machine: `Active → Closed`.
//!
//! # Threading model
//!
//! Commands are served from one thread, but `close()` may also run from a
//! shutdown path. The closed flag is flipped with a compare-exchange so the
//! teardown happens exactly once, and the backend sits behind a mutex so a
//! pull in progress finishes before the backend is released.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};
use wgcap_core::{CaptureError, FrameSize, PixelBuffer};

use crate::backend::{CaptureBackend, CapturedFrame, MapResult, MappedView};

struct SessionState<B> {
    backend:   B,
    last_size: FrameSize,
    /// Size the backend's pool was last allocated at. Differs from
    /// `last_size` while a recreate is outstanding.
    pool_size: FrameSize,
}

/// A live binding of one capture target to the shared graphics device.
pub struct CaptureSession<B: CaptureBackend> {
    closed: AtomicBool,
    state: Mutex<Option<SessionState<B>>>,
}

impl<B: CaptureBackend> CaptureSession<B> {
    /// Wrap a fully constructed backend whose pool is sized `initial_size`.
    pub fn new(backend: B, initial_size: FrameSize) -> Self {
        Self {
            closed: AtomicBool::new(false),
            state: Mutex::new(Some(SessionState {
                backend,
                last_size: initial_size,
                pool_size: initial_size,
            })),
        }
    }

    /// Begin the frame stream. Call once per session.
    pub fn start(&self) -> Result<(), CaptureError> {
        let mut guard = self.lock();
        let state = self.active(&mut guard)?;
        state.backend.start()?;
        info!("Capture started at {}", state.last_size);
        Ok(())
    }

    /// Release the frame pool, swap chain, OS session and target. Idempotent.
    pub fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let state = self.lock().take();
        if let Some(state) = state {
            state.backend.close();
            info!("Capture session closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Last content size seen, or `None` once closed.
    pub fn size(&self) -> Option<FrameSize> {
        self.lock().as_ref().map(|state| state.last_size)
    }

    /// Poll for the next frame and copy it into a packed BGRA buffer.
    ///
    /// `Ok(None)` means nothing was queued yet; keep polling. A
    /// [`CaptureError::FrameMap`] means this session is unusable.
    ///
    /// When the content size changes the new size is recorded, but the pool is
    /// only recreated after the current frame has been copied out, since that
    /// frame was produced at the old size. A failed recreate is logged and
    /// retried on the next pull; the frame already copied is still returned.
    pub fn try_pull_frame(&self) -> Result<Option<PixelBuffer>, CaptureError> {
        let mut guard = self.lock();
        let state = self.active(&mut guard)?;

        let Some(frame) = state.backend.try_next_frame()? else {
            return Ok(None);
        };

        let content = frame.content_size()?;
        if content != state.last_size {
            debug!("Content size changed {} → {}", state.last_size, content);
            state.last_size = content;
        }

        let pixels = read_frame(&frame, content)?;
        drop(frame);

        if state.pool_size != state.last_size {
            match state.backend.recreate_pool(state.last_size) {
                Ok(()) => {
                    state.pool_size = state.last_size;
                    info!("Frame pool recreated at {}", state.pool_size);
                }
                Err(e) => warn!("Frame pool recreate at {} failed, will retry: {e}", state.last_size),
            }
        }

        Ok(Some(pixels))
    }

    fn lock(&self) -> MutexGuard<'_, Option<SessionState<B>>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn active<'g>(
        &self,
        guard: &'g mut MutexGuard<'_, Option<SessionState<B>>>,
    ) -> Result<&'g mut SessionState<B>, CaptureError> {
        if self.is_closed() {
            return Err(CaptureError::ClosedSession);
        }
        guard.as_mut().ok_or(CaptureError::ClosedSession)
    }
}

impl<B: CaptureBackend> Drop for CaptureSession<B> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Map `frame` (through a staging copy if needed) and pack its rows.
/// The view is unmapped before this returns.
fn read_frame<F: CapturedFrame>(frame: &F, content: FrameSize) -> Result<PixelBuffer, CaptureError> {
    let view = match frame.map_direct()? {
        MapResult::Direct(view) => view,
        MapResult::NeedsStaging => {
            debug!("Texture not CPU-readable, copying through staging");
            frame.map_staged()?
        }
    };

    // A frame whose content outgrew the pool still lives in a pool-sized texture.
    let size = content.clamp_to(view.extent());
    PixelBuffer::from_pitched(view.bytes(), view.row_pitch(), size)
        .map_err(|e| CaptureError::FrameMap { reason: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CaptureHost;
    use crate::testing::{FakeFrame, FakeHost};

    const WINDOW: u64 = 0x1_0042;

    fn host(size: FrameSize) -> FakeHost {
        FakeHost::new().with_window(WINDOW, "Untitled - Notepad", size)
    }

    #[test]
    fn empty_pool_is_not_an_error() {
        let host = host(FrameSize::new(4, 4));
        let session = host.open_session(WINDOW).unwrap();
        session.start().unwrap();
        assert!(session.try_pull_frame().unwrap().is_none());
    }

    #[test]
    fn pulls_packed_pixels_and_unmaps() {
        let host = host(FrameSize::new(3, 2));
        let session = host.open_session(WINDOW).unwrap();
        session.start().unwrap();
        host.push_frame(WINDOW, FakeFrame::solid(FrameSize::new(3, 2), [1, 2, 3, 4]));

        let pixels = session.try_pull_frame().unwrap().expect("queued frame");
        assert_eq!(pixels.size(), FrameSize::new(3, 2));
        assert_eq!(pixels.as_bytes(), [1u8, 2, 3, 4].repeat(6).as_slice());

        let stats = host.stats();
        assert_eq!(stats.unmapped, 1);
        assert_eq!(stats.staged_maps, 0);
        assert!(stats.recreated.is_empty());
    }

    #[test]
    fn falls_back_to_staging_copy() {
        let host = host(FrameSize::new(2, 2));
        let session = host.open_session(WINDOW).unwrap();
        session.start().unwrap();
        host.push_frame(WINDOW, FakeFrame::solid(FrameSize::new(2, 2), [9, 8, 7, 6]).staging_only());

        let pixels = session.try_pull_frame().unwrap().unwrap();
        assert_eq!(pixels.pixel(1, 1), Some([9, 8, 7, 6]));
        assert_eq!(host.stats().staged_maps, 1);
        assert_eq!(host.stats().unmapped, 1);
    }

    #[test]
    fn map_failure_is_frame_map_error() {
        let host = host(FrameSize::new(2, 2));
        let session = host.open_session(WINDOW).unwrap();
        session.start().unwrap();
        host.push_frame(WINDOW, FakeFrame::solid(FrameSize::new(2, 2), [0; 4]).failing());

        let err = session.try_pull_frame().unwrap_err();
        assert!(matches!(err, CaptureError::FrameMap { .. }));
        assert!(err.is_fatal_to_session());
    }

    #[test]
    fn resize_is_applied_after_the_frame_in_flight() {
        let host = host(FrameSize::new(4, 4));
        let session = host.open_session(WINDOW).unwrap();
        session.start().unwrap();

        // The window grew; this frame still lives in a 4×4 pool texture.
        host.push_frame(WINDOW, FakeFrame::solid(FrameSize::new(6, 3), [5; 4]));
        let first = session.try_pull_frame().unwrap().unwrap();
        assert_eq!(first.size(), FrameSize::new(4, 3));
        assert_eq!(session.size(), Some(FrameSize::new(6, 3)));
        assert_eq!(host.stats().recreated, vec![FrameSize::new(6, 3)]);

        host.push_frame(WINDOW, FakeFrame::solid(FrameSize::new(6, 3), [7; 4]));
        let second = session.try_pull_frame().unwrap().unwrap();
        assert_eq!(second.size(), FrameSize::new(6, 3));
        assert_eq!(second.pixel(5, 2), Some([7; 4]));
        assert_eq!(host.stats().recreated.len(), 1);
    }

    #[test]
    fn failed_recreate_is_retried_on_the_next_pull() {
        let host = host(FrameSize::new(4, 4));
        let session = host.open_session(WINDOW).unwrap();
        session.start().unwrap();
        host.fail_next_recreate();

        host.push_frame(WINDOW, FakeFrame::solid(FrameSize::new(6, 3), [1; 4]));
        let first = session.try_pull_frame().unwrap().expect("frame survives the failed recreate");
        assert_eq!(first.size(), FrameSize::new(4, 3));
        assert!(host.stats().recreated.is_empty());

        host.push_frame(WINDOW, FakeFrame::solid(FrameSize::new(6, 3), [2; 4]));
        let second = session.try_pull_frame().unwrap().unwrap();
        assert_eq!(second.size(), FrameSize::new(4, 3));
        assert_eq!(host.stats().recreated, vec![FrameSize::new(6, 3)]);

        host.push_frame(WINDOW, FakeFrame::solid(FrameSize::new(6, 3), [3; 4]));
        let third = session.try_pull_frame().unwrap().unwrap();
        assert_eq!(third.size(), FrameSize::new(6, 3));
        assert_eq!(third.pixel(5, 2), Some([3; 4]));
        assert_eq!(host.stats().recreate_attempts, 2);
    }

    #[test]
    fn frame_acquire_failure_is_surfaced() {
        let host = host(FrameSize::new(2, 2));
        let session = host.open_session(WINDOW).unwrap();
        session.start().unwrap();
        host.break_pool(WINDOW);

        let err = session.try_pull_frame().unwrap_err();
        assert!(matches!(err, CaptureError::FrameMap { .. }));
    }

    #[test]
    fn shrinking_content_returns_content_size() {
        let host = host(FrameSize::new(8, 8));
        let session = host.open_session(WINDOW).unwrap();
        session.start().unwrap();

        host.push_frame(WINDOW, FakeFrame::solid(FrameSize::new(5, 2), [3; 4]));
        let pixels = session.try_pull_frame().unwrap().unwrap();
        assert_eq!(pixels.size(), FrameSize::new(5, 2));
        assert_eq!(pixels.as_bytes().len(), 5 * 2 * 4);
    }

    #[test]
    fn close_is_idempotent_and_terminal() {
        let host = host(FrameSize::new(2, 2));
        let session = host.open_session(WINDOW).unwrap();
        session.start().unwrap();

        session.close();
        session.close();
        assert!(session.is_closed());
        assert_eq!(session.size(), None);
        assert_eq!(host.stats().closed, 1);

        assert!(matches!(session.start(), Err(CaptureError::ClosedSession)));
        assert!(matches!(session.try_pull_frame(), Err(CaptureError::ClosedSession)));
    }

    #[test]
    fn concurrent_close_tears_down_once() {
        let host = host(FrameSize::new(2, 2));
        let session = host.open_session(WINDOW).unwrap();

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| session.close());
            }
        });

        assert_eq!(host.stats().closed, 1);
        assert_eq!(host.stats().live_sessions(), 0);
    }

    #[test]
    fn drop_closes_the_backend() {
        let host = host(FrameSize::new(2, 2));
        {
            let _session = host.open_session(WINDOW).unwrap();
            assert_eq!(host.stats().live_sessions(), 1);
        }
        assert_eq!(host.stats().live_sessions(), 0);
    }

    #[test]
    fn unknown_window_is_invalid_target() {
        let host = host(FrameSize::new(2, 2));
        let err = host.open_session(7).err().expect("unknown window is rejected");
        assert!(matches!(err, CaptureError::InvalidTarget { window_id: 7, .. }));
        assert_eq!(host.stats().opened, 0);
    }
}
