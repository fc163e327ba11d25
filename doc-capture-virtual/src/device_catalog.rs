//! Virtual camera devices.
//!
//! Mirrors what a phone reports: a back camera with flash, optical zoom
//! and near-focus support, and a front camera without either.

use doc_capture_core::models::device::{CaptureDevice, DevicePosition, ResolutionPreset};

pub const BACK_CAMERA_ID: &str = "virtual-back-wide";
pub const FRONT_CAMERA_ID: &str = "virtual-front";

/// Builds device lists for a `VirtualCamera`.
pub struct DeviceCatalog;

impl DeviceCatalog {
    /// Back and front camera, back first.
    pub fn phone() -> Vec<CaptureDevice> {
        vec![Self::back_camera(), Self::front_camera()]
    }

    /// Only a front camera (laptop/tablet style).
    pub fn front_only() -> Vec<CaptureDevice> {
        vec![Self::front_camera()]
    }

    pub fn back_camera() -> CaptureDevice {
        CaptureDevice {
            id: BACK_CAMERA_ID.into(),
            name: "Back Wide Camera".into(),
            position: DevicePosition::Back,
            has_flash: true,
            max_zoom_factor: 10.0,
            supports_near_focus: true,
            supported_presets: ResolutionPreset::BY_PREFERENCE.to_vec(),
        }
    }

    pub fn front_camera() -> CaptureDevice {
        CaptureDevice {
            id: FRONT_CAMERA_ID.into(),
            name: "Front Camera".into(),
            position: DevicePosition::Front,
            has_flash: false,
            max_zoom_factor: 1.0,
            supports_near_focus: false,
            supported_presets: vec![
                ResolutionPreset::Hd1920x1080,
                ResolutionPreset::Hd1280x720,
                ResolutionPreset::Vga640x480,
            ],
        }
    }

    /// Find a device by id in `devices`.
    pub fn find<'a>(devices: &'a [CaptureDevice], id: &str) -> Option<&'a CaptureDevice> {
        devices.iter().find(|d| d.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_has_back_and_front() {
        let devices = DeviceCatalog::phone();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].position, DevicePosition::Back);
        assert!(devices[0].has_flash);
        assert!(!devices[1].has_flash);
        assert!(DeviceCatalog::find(&devices, FRONT_CAMERA_ID).is_some());
        assert!(DeviceCatalog::find(&devices, "missing").is_none());
    }

    #[test]
    fn front_camera_tops_out_at_full_hd() {
        let front = DeviceCatalog::front_camera();
        assert!(!front.supports_preset(ResolutionPreset::Uhd3840x2160));
        assert!(front.supports_preset(ResolutionPreset::Hd1920x1080));
    }
}
