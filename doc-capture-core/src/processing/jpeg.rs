use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use sha2::{Digest, Sha256};

use crate::models::capture_models::{PhotoEncoding, PixelFormat, RawPhoto};
use crate::models::error::CaptureError;

/// Quality used when a photo has to be (re-)encoded. Equivalent to 1.0.
pub const JPEG_QUALITY: u8 = 100;

const JPEG_SOI: [u8; 3] = [0xFF, 0xD8, 0xFF];

pub fn is_jpeg(data: &[u8]) -> bool {
    data.starts_with(&JPEG_SOI)
}

/// Turn hardware photo output into JPEG bytes.
///
/// JPEG data is returned untouched; raw pixel buffers are encoded.
pub fn photo_to_jpeg(photo: RawPhoto) -> Result<Vec<u8>, CaptureError> {
    match photo.encoding {
        PhotoEncoding::Jpeg => Ok(photo.data),
        PhotoEncoding::Raw { width, height, format } => {
            let image = raw_to_image(photo.data, width, height, format).ok_or_else(|| {
                CaptureError::CaptureFailed(format!(
                    "photo buffer does not match {}x{} {:?}",
                    width, height, format
                ))
            })?;
            encode_jpeg(&image.to_rgb8())
        }
    }
}

/// JPEG bytes for arbitrary encoded image data (used for the debug override).
pub fn ensure_jpeg(data: &[u8]) -> Result<Vec<u8>, CaptureError> {
    if is_jpeg(data) {
        return Ok(data.to_vec());
    }
    let image = image::load_from_memory(data)
        .map_err(|e| CaptureError::CaptureFailed(format!("unsupported image data: {}", e)))?;
    encode_jpeg(&image.to_rgb8())
}

fn raw_to_image(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Option<DynamicImage> {
    match format {
        PixelFormat::Luma8 => GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8),
        PixelFormat::Rgb8 => RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8),
        PixelFormat::Rgba8 => RgbaImage::from_raw(width, height, data).map(DynamicImage::ImageRgba8),
    }
}

fn encode_jpeg(rgb: &RgbImage) -> Result<Vec<u8>, CaptureError> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)
        .map_err(|e| CaptureError::CaptureFailed(format!("JPEG encoding failed: {}", e)))?;
    Ok(buffer)
}

/// SHA-256 hex digest of encoded image bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
