//! QR code detection on virtual video frames using rqrr.
//!
//! Plays the part of the platform metadata output: the virtual camera runs
//! every frame through `decode_frame` and hands the decoded strings to the
//! attached metadata callback.

use doc_capture_core::models::capture_models::{PixelFormat, VideoFrame};

/// Decoded contents of every readable QR code in `frame`.
///
/// Malformed frames and unreadable grids yield nothing.
pub fn decode_frame(frame: &VideoFrame) -> Vec<String> {
    if !frame.is_well_formed() {
        log::debug!("frame {}: buffer does not match its dimensions", frame.sequence);
        return Vec::new();
    }
    let width = frame.width as usize;
    let height = frame.height as usize;
    let bpp = frame.format.bytes_per_pixel();
    let data = &frame.data;

    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
        let offset = (y * width + x) * bpp;
        luma(frame.format, &data[offset..offset + bpp])
    });

    let mut decoded = Vec::new();
    for grid in prepared.detect_grids() {
        match grid.decode() {
            Ok((_, content)) => decoded.push(content),
            Err(e) => log::debug!("frame {}: unreadable QR grid: {:?}", frame.sequence, e),
        }
    }
    decoded
}

/// ITU-R BT.601 luma of one pixel.
fn luma(format: PixelFormat, pixel: &[u8]) -> u8 {
    match format {
        PixelFormat::Luma8 => pixel[0],
        PixelFormat::Rgb8 | PixelFormat::Rgba8 => {
            let (r, g, b) = (pixel[0] as u32, pixel[1] as u32, pixel[2] as u32);
            ((r * 299 + g * 587 + b * 114) / 1000) as u8
        }
    }
}
