//! Application context: the shared capture host, the single active-session
//! slot, and the command handlers that operate on them.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, warn};
use wgcap_capture::{CaptureBackend, CaptureHost, CaptureSession};
use wgcap_core::{bitmap, PixelBuffer, ServerConfig};

use crate::command::{Command, CommandError, Response};

pub struct AppContext<H: CaptureHost> {
    host:   H,
    active: Option<CaptureSession<H::Backend>>,
    config: ServerConfig,
}

impl<H: CaptureHost> AppContext<H> {
    pub fn new(host: H, config: ServerConfig) -> Self {
        Self { host, active: None, config }
    }

    pub fn has_active_session(&self) -> bool {
        self.active.is_some()
    }

    /// Parse and run one raw request. Every failure becomes an error response.
    pub async fn handle(&mut self, request: &[u8]) -> Response {
        match self.try_handle(request).await {
            Ok(result) => Response::ok(result),
            Err(e) => {
                warn!("Command failed: {e}");
                Response::error(&e)
            }
        }
    }

    async fn try_handle(&mut self, request: &[u8]) -> Result<Value, CommandError> {
        let json: Value = serde_json::from_slice(request)
            .map_err(|e| CommandError::MalformedRequest { reason: e.to_string() })?;
        let command = Command::parse(&json)?;
        debug!("Dispatching {:?}", command);
        self.dispatch(command).await
    }

    pub async fn dispatch(&mut self, command: Command) -> Result<Value, CommandError> {
        match command {
            Command::EnumWindows => self.enum_windows(),
            Command::CaptureStart { window_id } => self.capture_start(window_id),
            Command::CaptureEnd => Ok(self.capture_end()),
            Command::CaptureFrame { path } => self.capture_frame(path).await,
        }
    }

    /// Close whatever session is active. Called on the way out of the process.
    pub fn shutdown(&mut self) {
        if self.has_active_session() {
            info!("Closing the active capture session on shutdown");
        }
        self.end_session();
    }

    // ── Handlers ──────────────────────────────────────────────────────────────

    fn enum_windows(&self) -> Result<Value, CommandError> {
        let windows = self.host.enumerate_windows()?;
        Ok(json!(windows))
    }

    fn capture_start(&mut self, window_id: u64) -> Result<Value, CommandError> {
        // One session per process: the previous one goes before the new one is built.
        self.end_session();

        let session = self.host.open_session(window_id)?;
        session.start()?;
        info!("Capturing window {window_id}");
        self.active = Some(session);
        Ok(json!("OK"))
    }

    fn capture_end(&mut self) -> Value {
        self.end_session();
        json!("OK")
    }

    async fn capture_frame(&mut self, path: Option<PathBuf>) -> Result<Value, CommandError> {
        let session = self.active.as_ref().ok_or(CommandError::NoActiveSession)?;

        let polled = poll_frame(session, self.config.frame_poll_attempts, self.config.frame_poll_interval()).await;
        let pixels = match polled {
            Ok(pixels) => pixels,
            Err(CommandError::Capture(e)) if e.is_fatal_to_session() => {
                warn!("Closing capture session after fatal error: {e}");
                self.end_session();
                return Err(e.into());
            }
            Err(e) => return Err(e),
        };

        let path = path.unwrap_or_else(|| self.config.snapshot_path.clone());
        bitmap::write_bmp(&path, &pixels)?;
        info!("Frame {} written to {}", pixels.size(), path.display());

        Ok(json!({
            "path": path.display().to_string(),
            "width": pixels.width(),
            "height": pixels.height(),
        }))
    }

    fn end_session(&mut self) {
        if let Some(session) = self.active.take() {
            session.close();
        }
    }
}

/// Poll `session` until a frame arrives, at most `attempts` times.
pub async fn poll_frame<B: CaptureBackend>(
    session: &CaptureSession<B>,
    attempts: u32,
    interval: Duration,
) -> Result<PixelBuffer, CommandError> {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        if let Some(pixels) = session.try_pull_frame()? {
            debug!("Frame {} after {attempt} poll(s)", pixels.size());
            return Ok(pixels);
        }
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    Err(CommandError::FrameTimeout { attempts })
}
