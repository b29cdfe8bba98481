use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Graphics device creation failed: {reason}")]
    DeviceCreation { reason: String },

    #[error("Invalid capture target {window_id}: {reason}")]
    InvalidTarget { window_id: u64, reason: String },

    #[error("Capture session is closed")]
    ClosedSession,

    #[error("Failed to map frame: {reason}")]
    FrameMap { reason: String },

    #[error("{call} failed: {reason}")]
    Platform { call: &'static str, reason: String },

    #[error("Invalid pixel buffer: {reason}")]
    InvalidBuffer { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// Errors after which the session that produced them must not be used again.
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(self, Self::FrameMap { .. })
    }
}
