use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::device::{CaptureDevice, ResolutionPreset};

/// Orientation metadata stamped on a still capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoOrientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlashMode {
    On,
    Off,
}

/// Encoded output format of a still capture. Only JPEG is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PhotoFormat {
    #[default]
    Jpeg,
}

/// Settings for one still-capture request.
///
/// Built fresh for every request from the active device and the user's
/// flash toggle, so a device switch can never leave stale settings behind.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    pub preset: ResolutionPreset,
    pub flash_mode: FlashMode,
    pub format: PhotoFormat,
    pub orientation: VideoOrientation,
}

impl CaptureSettings {
    pub fn for_device(
        device: &CaptureDevice,
        preset: ResolutionPreset,
        flash_requested: bool,
        orientation: VideoOrientation,
    ) -> Self {
        let flash_mode = if flash_requested && device.has_flash {
            FlashMode::On
        } else {
            FlashMode::Off
        };
        Self {
            preset,
            flash_mode,
            format: PhotoFormat::Jpeg,
            orientation,
        }
    }
}

/// Pixel layout of a streamed video frame or an unencoded photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Luma8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Luma8 => 1,
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }
}

/// A frame delivered by the video-frame output.
///
/// Pixel data is reference-counted so handing a frame to the frame queue
/// never copies it.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Arc<[u8]>,
}

impl VideoFrame {
    pub fn new(sequence: u64, width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            sequence,
            width,
            height,
            format,
            data: data.into(),
        }
    }

    /// Whether the buffer holds exactly `width * height` pixels.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// How the hardware handed back a still photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoEncoding {
    Jpeg,
    Raw { width: u32, height: u32, format: PixelFormat },
}

/// Photo data exactly as the hardware produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPhoto {
    pub data: Vec<u8>,
    pub encoding: PhotoEncoding,
}

/// Counters for debugging capture sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureDiagnostics {
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub frames_recognized: u64,
    pub recognition_failures: u64,
    pub qr_payloads_emitted: u64,
    pub stills_captured: u64,
    pub still_failures: u64,
    pub configuration_transactions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::device::DevicePosition;

    fn device(has_flash: bool) -> CaptureDevice {
        CaptureDevice {
            id: "cam".into(),
            name: "Camera".into(),
            position: DevicePosition::Back,
            has_flash,
            max_zoom_factor: 4.0,
            supports_near_focus: true,
            supported_presets: vec![ResolutionPreset::Photo],
        }
    }

    #[test]
    fn flash_requires_device_support() {
        let settings = CaptureSettings::for_device(
            &device(false),
            ResolutionPreset::Photo,
            true,
            VideoOrientation::Portrait,
        );
        assert_eq!(settings.flash_mode, FlashMode::Off);

        let settings = CaptureSettings::for_device(
            &device(true),
            ResolutionPreset::Photo,
            true,
            VideoOrientation::LandscapeLeft,
        );
        assert_eq!(settings.flash_mode, FlashMode::On);
        assert_eq!(settings.format, PhotoFormat::Jpeg);
        assert_eq!(settings.orientation, VideoOrientation::LandscapeLeft);
    }

    #[test]
    fn frame_shape_check() {
        let frame = VideoFrame::new(1, 2, 2, PixelFormat::Rgba8, vec![0; 16]);
        assert!(frame.is_well_formed());
        let frame = VideoFrame::new(1, 2, 2, PixelFormat::Luma8, vec![0; 3]);
        assert!(!frame.is_well_formed());
    }
}
