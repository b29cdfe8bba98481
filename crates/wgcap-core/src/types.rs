use serde::{Deserialize, Serialize};

use crate::pixels::BYTES_PER_PIXEL;

// MARK: - FrameSize

/// Pixel dimensions of a capture target, a frame's content, or a texture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Bytes in one tightly packed BGRA row.
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Bytes in a tightly packed BGRA image of this size.
    pub fn byte_len(&self) -> usize {
        self.stride() * self.height as usize
    }

    /// Largest size that fits inside both `self` and `bounds`.
    pub fn clamp_to(&self, bounds: FrameSize) -> FrameSize {
        Self {
            width: self.width.min(bounds.width),
            height: self.height.min(bounds.height),
        }
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}×{}", self.width, self.height)
    }
}

// MARK: - WindowInfo

/// One top-level window as reported by `enum_windows`.
///
/// The handle travels as a decimal string on the wire (`"hwnd": "655618"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    #[serde(rename = "hwnd", with = "decimal_handle")]
    pub id: u64,
    pub title: String,
}

impl WindowInfo {
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self { id, title: title.into() }
    }
}

mod decimal_handle {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.trim().parse().map_err(D::Error::custom)
    }
}
