//! In-memory capture host for exercising sessions without a GPU.
//!
//! Frames are queued per window with [`FakeHost::push_frame`]. Each frame is
//! laid out in a texture the size of the backend's current pool, with padded
//! rows, the way a real frame pool hands them out.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use wgcap_core::{CaptureError, FrameSize, PixelBuffer, WindowInfo};

use crate::backend::{CaptureBackend, CaptureHost, CapturedFrame, MapResult, MappedView};
use crate::session::CaptureSession;

/// Extra bytes at the end of every fake texture row.
const ROW_PADDING: usize = 12;
const PADDING_BYTE: u8 = 0xEE;

/// A frame waiting in a fake pool.
#[derive(Debug, Clone)]
pub struct FakeFrame {
    pub content: PixelBuffer,
    pub staging_only: bool,
    pub fail_map: bool,
}

impl FakeFrame {
    /// Content of `size` filled with one BGRA value.
    pub fn solid(size: FrameSize, bgra: [u8; 4]) -> Self {
        let content = PixelBuffer::new(bgra.repeat(size.width as usize * size.height as usize), size)
            .expect("solid frame length matches its size");
        Self { content, staging_only: false, fail_map: false }
    }

    /// Direct mapping is rejected, as for a GPU-only texture.
    pub fn staging_only(mut self) -> Self {
        self.staging_only = true;
        self
    }

    /// Every mapping attempt fails.
    pub fn failing(mut self) -> Self {
        self.fail_map = true;
        self
    }
}

/// Counters describing what the fake backends did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FakeStats {
    pub opened: usize,
    pub started: usize,
    pub closed: usize,
    /// Pool sizes successfully recreated, in order.
    pub recreated: Vec<FrameSize>,
    pub recreate_attempts: usize,
    pub staged_maps: usize,
    pub unmapped: usize,
}

impl FakeStats {
    pub fn live_sessions(&self) -> usize {
        self.opened - self.closed
    }
}

#[derive(Default)]
struct FakeState {
    windows: Vec<(WindowInfo, FrameSize)>,
    queues: HashMap<u64, VecDeque<FakeFrame>>,
    broken_pools: HashSet<u64>,
    failing_recreates: usize,
    stats: FakeStats,
}

type Shared = Arc<Mutex<FakeState>>;

fn lock(state: &Shared) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── FakeHost ──────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct FakeHost {
    state: Shared,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(self, id: u64, title: &str, size: FrameSize) -> Self {
        lock(&self.state).windows.push((WindowInfo::new(id, title), size));
        self
    }

    pub fn push_frame(&self, window_id: u64, frame: FakeFrame) {
        lock(&self.state).queues.entry(window_id).or_default().push_back(frame);
    }

    /// The next pool recreate fails, as on a transient device error.
    pub fn fail_next_recreate(&self) {
        lock(&self.state).failing_recreates += 1;
    }

    /// Every later frame acquisition for `window_id` fails, as after the
    /// device is removed or the pool is closed underneath the session.
    pub fn break_pool(&self, window_id: u64) {
        lock(&self.state).broken_pools.insert(window_id);
    }

    pub fn stats(&self) -> FakeStats {
        lock(&self.state).stats.clone()
    }
}

impl CaptureHost for FakeHost {
    type Backend = FakeBackend;

    fn enumerate_windows(&self) -> Result<Vec<WindowInfo>, CaptureError> {
        Ok(lock(&self.state).windows.iter().map(|(info, _)| info.clone()).collect())
    }

    fn open_session(&self, window_id: u64) -> Result<CaptureSession<FakeBackend>, CaptureError> {
        let mut state = lock(&self.state);
        let size = state
            .windows
            .iter()
            .find(|(info, _)| info.id == window_id)
            .map(|(_, size)| *size)
            .ok_or_else(|| CaptureError::InvalidTarget {
                window_id,
                reason: "no such window".to_owned(),
            })?;
        state.stats.opened += 1;
        drop(state);

        let backend = FakeBackend { window_id, pool_size: size, state: Arc::clone(&self.state) };
        Ok(CaptureSession::new(backend, size))
    }
}

// ── FakeBackend ───────────────────────────────────────────────────────────────

pub struct FakeBackend {
    window_id: u64,
    pool_size: FrameSize,
    state: Shared,
}

impl CaptureBackend for FakeBackend {
    type Frame = FakeTexture;

    fn start(&mut self) -> Result<(), CaptureError> {
        lock(&self.state).stats.started += 1;
        Ok(())
    }

    fn try_next_frame(&mut self) -> Result<Option<FakeTexture>, CaptureError> {
        let mut state = lock(&self.state);
        if state.broken_pools.contains(&self.window_id) {
            return Err(CaptureError::FrameMap { reason: "frame pool closed".to_owned() });
        }
        let frame = state
            .queues
            .get_mut(&self.window_id)
            .and_then(VecDeque::pop_front);
        drop(state);
        Ok(frame.map(|frame| FakeTexture::in_pool(frame, self.pool_size, Arc::clone(&self.state))))
    }

    fn recreate_pool(&mut self, size: FrameSize) -> Result<(), CaptureError> {
        let mut state = lock(&self.state);
        state.stats.recreate_attempts += 1;
        if state.failing_recreates > 0 {
            state.failing_recreates -= 1;
            return Err(CaptureError::Platform {
                call: "Direct3D11CaptureFramePool::Recreate",
                reason: "transient failure".to_owned(),
            });
        }
        state.stats.recreated.push(size);
        self.pool_size = size;
        Ok(())
    }

    fn close(self) {
        lock(&self.state).stats.closed += 1;
    }
}

// ── FakeTexture ───────────────────────────────────────────────────────────────

pub struct FakeTexture {
    content_size: FrameSize,
    extent: FrameSize,
    row_pitch: usize,
    data: Vec<u8>,
    staging_only: bool,
    fail_map: bool,
    state: Shared,
}

impl FakeTexture {
    fn in_pool(frame: FakeFrame, extent: FrameSize, state: Shared) -> Self {
        let row_pitch = extent.stride() + ROW_PADDING;
        let mut data = vec![PADDING_BYTE; row_pitch * extent.height as usize];

        let content = &frame.content;
        let overlap = content.size().clamp_to(extent);
        let copy_len = overlap.stride();
        for y in 0..overlap.height as usize {
            let src = y * content.stride();
            let dst = y * row_pitch;
            data[dst..dst + copy_len].copy_from_slice(&content.as_bytes()[src..src + copy_len]);
        }

        Self {
            content_size: content.size(),
            extent,
            row_pitch,
            data,
            staging_only: frame.staging_only,
            fail_map: frame.fail_map,
            state,
        }
    }

    fn check_map(&self) -> Result<(), CaptureError> {
        if self.fail_map {
            return Err(CaptureError::FrameMap { reason: "device removed".to_owned() });
        }
        Ok(())
    }
}

impl CapturedFrame for FakeTexture {
    type View<'a> = FakeView<'a>;

    fn content_size(&self) -> Result<FrameSize, CaptureError> {
        Ok(self.content_size)
    }

    fn map_direct(&self) -> Result<MapResult<FakeView<'_>>, CaptureError> {
        self.check_map()?;
        if self.staging_only {
            return Ok(MapResult::NeedsStaging);
        }
        Ok(MapResult::Direct(FakeView { texture: self }))
    }

    fn map_staged(&self) -> Result<FakeView<'_>, CaptureError> {
        self.check_map()?;
        lock(&self.state).stats.staged_maps += 1;
        Ok(FakeView { texture: self })
    }
}

pub struct FakeView<'a> {
    texture: &'a FakeTexture,
}

impl MappedView for FakeView<'_> {
    fn row_pitch(&self) -> usize {
        self.texture.row_pitch
    }

    fn extent(&self) -> FrameSize {
        self.texture.extent
    }

    fn bytes(&self) -> &[u8] {
        &self.texture.data
    }
}

impl Drop for FakeView<'_> {
    fn drop(&mut self) {
        lock(&self.texture.state).stats.unmapped += 1;
    }
}
