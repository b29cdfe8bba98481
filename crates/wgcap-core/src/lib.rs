pub mod bitmap;
pub mod config;
pub mod errors;
pub mod pixels;
pub mod types;

pub use config::ServerConfig;
pub use errors::CaptureError;
pub use pixels::{PixelBuffer, BYTES_PER_PIXEL};
pub use types::*;
