//! Tightly packed BGRA pixel buffers.
//!
//! GPU textures are mapped with a row pitch that is usually wider than
//! `width * 4` because of alignment. [`PixelBuffer::from_pitched`] strips that
//! padding so consecutive rows touch.

use crate::errors::CaptureError;
use crate::types::FrameSize;

pub const BYTES_PER_PIXEL: usize = 4;

/// CPU-owned BGRA image, row-major, no gaps between rows.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    size: FrameSize,
}

impl PixelBuffer {
    /// Wrap an already packed buffer. `data` must hold exactly `4 * w * h` bytes.
    pub fn new(data: Vec<u8>, size: FrameSize) -> Result<Self, CaptureError> {
        if data.len() != size.byte_len() {
            return Err(CaptureError::InvalidBuffer {
                reason: format!(
                    "{} bytes for a {} BGRA image (expected {})",
                    data.len(),
                    size,
                    size.byte_len()
                ),
            });
        }
        Ok(Self { data, size })
    }

    /// Copy `size.height` rows of `size.stride()` bytes out of a pitched source.
    pub fn from_pitched(src: &[u8], row_pitch: usize, size: FrameSize) -> Result<Self, CaptureError> {
        if size.is_empty() {
            return Ok(Self { data: Vec::new(), size });
        }

        let stride = size.stride();
        if row_pitch < stride {
            return Err(CaptureError::InvalidBuffer {
                reason: format!("row pitch {row_pitch} is narrower than a {}px row", size.width),
            });
        }

        // The last row only needs `stride` bytes, not a full pitch.
        let required = row_pitch * (size.height as usize - 1) + stride;
        if src.len() < required {
            return Err(CaptureError::InvalidBuffer {
                reason: format!(
                    "source holds {} bytes, {} needed for {} at pitch {}",
                    src.len(),
                    required,
                    size,
                    row_pitch
                ),
            });
        }

        let mut data = vec![0u8; size.byte_len()];
        for (y, dst) in data.chunks_exact_mut(stride).enumerate() {
            let start = y * row_pitch;
            dst.copy_from_slice(&src[start..start + stride]);
        }

        Ok(Self { data, size })
    }

    /// Lay the rows back out at `row_pitch`, zero-filling the padding.
    pub fn to_pitched(&self, row_pitch: usize) -> Vec<u8> {
        let stride = self.stride();
        let row_pitch = row_pitch.max(stride);
        let mut out = vec![0u8; row_pitch * self.size.height as usize];
        if stride == 0 {
            return out;
        }
        for (y, row) in self.data.chunks_exact(stride).enumerate() {
            let start = y * row_pitch;
            out[start..start + stride].copy_from_slice(row);
        }
        out
    }

    pub fn size(&self) -> FrameSize {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn stride(&self) -> usize {
        self.size.stride()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// BGRA value at (`x`, `y`), or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; BYTES_PER_PIXEL]> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let offset = y as usize * self.stride() + x as usize * BYTES_PER_PIXEL;
        let mut px = [0u8; BYTES_PER_PIXEL];
        px.copy_from_slice(&self.data[offset..offset + BYTES_PER_PIXEL]);
        Some(px)
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("size", &self.size)
            .field("bytes", &self.data.len())
            .finish()
    }
}
