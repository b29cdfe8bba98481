//! Single-shot mode: capture one frame of one window to a bitmap and exit.

use std::path::Path;

use tracing::info;
use wgcap_capture::CaptureHost;
use wgcap_core::{bitmap, FrameSize, ServerConfig};

use crate::app::poll_frame;
use crate::command::CommandError;

pub async fn run<H: CaptureHost>(
    host: &H,
    window_id: u64,
    output: &Path,
    config: &ServerConfig,
) -> Result<FrameSize, CommandError> {
    let session = host.open_session(window_id)?;
    session.start()?;

    let polled = poll_frame(&session, config.frame_poll_attempts, config.frame_poll_interval()).await;
    session.close();
    let pixels = polled?;

    bitmap::write_bmp(output, &pixels)?;
    info!("Snapshot of window {window_id} ({}) written to {}", pixels.size(), output.display());
    Ok(pixels.size())
}
