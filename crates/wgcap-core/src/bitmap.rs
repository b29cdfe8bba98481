//! Uncompressed 24-bit BMP encoding of packed BGRA frames.
//!
//! Layout: 14-byte file header + 40-byte `BITMAPINFOHEADER`, then rows
//! bottom-up, each pixel as (B, G, R), each row zero-padded to 4 bytes.
//! Alpha is dropped.

use std::path::Path;

use tracing::debug;

use crate::errors::CaptureError;
use crate::pixels::{PixelBuffer, BYTES_PER_PIXEL};
use crate::types::FrameSize;

pub const FILE_HEADER_LEN: usize = 14;
pub const INFO_HEADER_LEN: usize = 40;
pub const PIXEL_DATA_OFFSET: usize = FILE_HEADER_LEN + INFO_HEADER_LEN;

const BITS_PER_PIXEL: u16 = 24;
const BYTES_PER_BMP_PIXEL: usize = 3;

/// Bytes per BMP row including padding to a 4-byte boundary.
pub fn row_pitch(width: u32) -> usize {
    (width as usize * BYTES_PER_BMP_PIXEL + 3) / 4 * 4
}

/// Encode a tightly packed BGRA buffer of `width`×`height` pixels.
pub fn encode_bmp(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, CaptureError> {
    let size = FrameSize::new(width, height);
    if pixels.len() < size.byte_len() {
        return Err(CaptureError::InvalidBuffer {
            reason: format!("{} bytes for a {} frame (expected {})", pixels.len(), size, size.byte_len()),
        });
    }
    if i32::try_from(width).is_err() || i32::try_from(height).is_err() {
        return Err(CaptureError::InvalidBuffer {
            reason: format!("{size} exceeds the BMP dimension range"),
        });
    }

    let pitch = row_pitch(width);
    let image_len = pitch * height as usize;
    let file_len = PIXEL_DATA_OFFSET + image_len;
    let file_len_u32 = u32::try_from(file_len).map_err(|_| CaptureError::InvalidBuffer {
        reason: format!("{size} does not fit in a BMP file"),
    })?;

    let mut out = Vec::with_capacity(file_len);

    // BITMAPFILEHEADER
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&file_len_u32.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // reserved
    out.extend_from_slice(&0u16.to_le_bytes()); // reserved
    out.extend_from_slice(&(PIXEL_DATA_OFFSET as u32).to_le_bytes());

    // BITMAPINFOHEADER
    out.extend_from_slice(&(INFO_HEADER_LEN as u32).to_le_bytes());
    out.extend_from_slice(&(width as i32).to_le_bytes());
    out.extend_from_slice(&(height as i32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // planes
    out.extend_from_slice(&BITS_PER_PIXEL.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // BI_RGB
    out.extend_from_slice(&0u32.to_le_bytes()); // image size, may be 0 for BI_RGB
    out.extend_from_slice(&0i32.to_le_bytes()); // x pixels per metre
    out.extend_from_slice(&0i32.to_le_bytes()); // y pixels per metre
    out.extend_from_slice(&0u32.to_le_bytes()); // colours used
    out.extend_from_slice(&0u32.to_le_bytes()); // important colours

    let stride = size.stride();
    let padding = pitch - width as usize * BYTES_PER_BMP_PIXEL;
    for y in (0..height as usize).rev() {
        let row = &pixels[y * stride..(y + 1) * stride];
        for bgra in row.chunks_exact(BYTES_PER_PIXEL) {
            out.extend_from_slice(&bgra[..BYTES_PER_BMP_PIXEL]);
        }
        out.resize(out.len() + padding, 0);
    }

    Ok(out)
}

/// Encode `frame` and write it to `path`, replacing any existing file.
pub fn write_bmp(path: impl AsRef<Path>, frame: &PixelBuffer) -> Result<(), CaptureError> {
    let path = path.as_ref();
    let bytes = encode_bmp(frame.as_bytes(), frame.width(), frame.height())?;
    std::fs::write(path, &bytes)?;
    debug!("Wrote {} bitmap ({} bytes) to {}", frame.size(), bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(buf: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
    }

    fn u16_at(buf: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap())
    }

    #[test]
    fn two_by_two_red_decodes_to_red() {
        let red = [0u8, 0, 255, 255].repeat(4);
        let bmp = encode_bmp(&red, 2, 2).unwrap();

        // 2 px * 3 bytes = 6, padded to 8 per row.
        assert_eq!(bmp.len(), 54 + 8 * 2);
        assert_eq!(&bmp[0..2], b"BM");
        assert_eq!(u32_at(&bmp, 2) as usize, bmp.len());
        assert_eq!(u32_at(&bmp, 10), 54);
        assert_eq!(u32_at(&bmp, 14), 40);
        assert_eq!(u32_at(&bmp, 18), 2);
        assert_eq!(u32_at(&bmp, 22), 2);
        assert_eq!(u16_at(&bmp, 26), 1);
        assert_eq!(u16_at(&bmp, 28), 24);
        assert!(bmp[30..54].iter().all(|&b| b == 0));

        for row in bmp[54..].chunks_exact(8) {
            for px in row[..6].chunks_exact(3) {
                let (b, g, r) = (px[0], px[1], px[2]);
                assert_eq!((r, g, b), (255, 0, 0));
            }
            assert_eq!(&row[6..], &[0, 0]);
        }
    }

    #[test]
    fn rows_are_written_bottom_up() {
        // 1×2: top pixel blue, bottom pixel green.
        let pixels = [255u8, 0, 0, 255, 0, 255, 0, 255];
        let bmp = encode_bmp(&pixels, 1, 2).unwrap();
        let data = &bmp[PIXEL_DATA_OFFSET..];
        assert_eq!(&data[0..4], &[0, 255, 0, 0]);
        assert_eq!(&data[4..8], &[255, 0, 0, 0]);
    }

    #[test]
    fn row_padding_only_when_needed() {
        assert_eq!(row_pitch(4), 12);
        assert_eq!(row_pitch(3), 12);
        assert_eq!(row_pitch(1), 4);
        assert_eq!(row_pitch(5), 16);
    }

    #[test]
    fn rejects_short_buffer() {
        let err = encode_bmp(&[0u8; 15], 2, 2).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidBuffer { .. }));
    }

    #[test]
    fn write_bmp_creates_file() {
        let frame = PixelBuffer::new([10u8, 20, 30, 40].repeat(6), FrameSize::new(3, 2)).unwrap();
        let path = std::env::temp_dir().join(format!("wgcap-bitmap-{}.bmp", std::process::id()));
        write_bmp(&path, &frame).unwrap();
        let written = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(written.len(), 54 + 12 * 2);
        assert_eq!(&written[54..57], &[10, 20, 30]);
    }
}
