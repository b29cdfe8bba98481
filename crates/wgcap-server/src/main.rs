//! wgcap: window capture helper driven over stdin/stdout.
//!
//! # Architecture
//!
//! ```text
//! parent process                       wgcap (this binary)
//! ─────────────────────────────── ─── ─────────────────────────────────────
//! {"cmd": ...}\n\n ──── stdin ──────► stdio::read_request
//!                                       │
//!                                       ▼
//!                                     AppContext::handle
//!                                       │  enum_windows / capture_start /
//!                                       │  capture_end / capture_frame
//!                                       ▼
//!                                     GraphicsDevice + CaptureSession (WGC)
//!                                       │
//! {"result": ...}  ◄─── stdout ─────────┤
//! {"error": ...}   ◄─── stderr ─────────┘
//! ```
//!
//! `wgcap snapshot <hwnd>` skips the protocol and writes one frame to disk.
//!
//! # Environment
//!
//! - `WGCAP_SNAPSHOT_PATH`: default bitmap path (`test.bmp`)
//! - `WGCAP_POLL_ATTEMPTS`, `WGCAP_POLL_INTERVAL_MS`: frame wait bounds
//! - `WGCAP_LOG` or `RUST_LOG`: log filter; logs go to stderr, off by default

mod app;
mod command;
mod snapshot;
mod stdio;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wgcap_capture::GraphicsDevice;
use wgcap_core::ServerConfig;

use crate::app::AppContext;

#[derive(Parser, Debug)]
#[command(name = "wgcap", version, about = "Windows.Graphics.Capture window capture helper")]
struct Cli {
    #[command(subcommand)]
    mode: Option<Mode>,

    /// Frame polls before a capture gives up.
    #[arg(long, global = true)]
    poll_attempts: Option<u32>,

    /// Delay between frame polls, in milliseconds.
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Mode {
    /// Answer JSON commands on stdin until it closes (default).
    Serve,
    /// Capture a single frame of one window and exit.
    Snapshot {
        /// Window handle, decimal.
        hwnd: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    fn config(&self) -> ServerConfig {
        let mut config = ServerConfig::from_env();
        if let Some(attempts) = self.poll_attempts {
            config.frame_poll_attempts = attempts;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.frame_poll_interval_ms = ms;
        }
        config
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli.config();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .init();

    info!("wgcap v{}", env!("CARGO_PKG_VERSION"));

    let device = GraphicsDevice::create().context("Failed to create the Direct3D 11 device")?;

    match cli.mode.unwrap_or(Mode::Serve) {
        Mode::Serve => serve(device, config).await,
        Mode::Snapshot { hwnd, output } => {
            let window_id: u64 = hwnd
                .trim()
                .parse()
                .with_context(|| format!("{hwnd:?} is not a decimal window handle"))?;
            let output = output.unwrap_or_else(|| config.snapshot_path.clone());
            let size = snapshot::run(&device, window_id, &output, &config)
                .await
                .with_context(|| format!("Snapshot of window {window_id} failed"))?;
            info!("Wrote {size} frame to {}", output.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

// MARK: - Serve

/// Runs until stdin closes. Input ending is how the parent tears us down, and
/// it is reported as a failure exit.
async fn serve(device: GraphicsDevice, config: ServerConfig) -> Result<ExitCode> {
    let mut ctx = AppContext::new(device, config);
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let mut out = tokio::io::stdout();
    let mut err = tokio::io::stderr();

    let served = stdio::serve(&mut ctx, input, &mut out, &mut err).await;
    ctx.shutdown();

    match served {
        Ok(()) => {
            info!("stdin closed, exiting");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            error!("stdio failure: {e}");
            Err(e).context("Lost the stdin/stdout channel")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_is_serve() {
        let cli = Cli::try_parse_from(["wgcap"]).unwrap();
        assert_eq!(cli.mode, None);
        assert_eq!(cli.poll_attempts, None);
    }

    #[test]
    fn snapshot_arguments() {
        let cli = Cli::try_parse_from(["wgcap", "snapshot", "66012", "-o", "out.bmp", "--poll-attempts", "7"])
            .unwrap();
        assert_eq!(
            cli.mode,
            Some(Mode::Snapshot { hwnd: "66012".into(), output: Some(PathBuf::from("out.bmp")) })
        );
        assert_eq!(cli.config().frame_poll_attempts, 7);
    }

    #[test]
    fn cli_overrides_poll_settings() {
        let cli = Cli::try_parse_from(["wgcap", "--poll-interval-ms", "25"]).unwrap();
        assert_eq!(cli.config().frame_poll_interval_ms, 25);
    }
}
