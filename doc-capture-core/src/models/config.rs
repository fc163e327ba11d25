use serde::{Deserialize, Serialize};

use super::device::DevicePosition;
use super::error::CaptureError;

/// Upper bound on recognition candidates requested per text line.
pub const MAX_CANDIDATES_PER_LINE: usize = 10;

/// Configuration for a capture session.
///
/// Passed once into `setup()`. Changing it while the session is running
/// requires a teardown and a fresh setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfiguration {
    /// Attach the metadata output and report payment QR codes (default: false).
    pub qr_scanning_enabled: bool,

    /// Attach the video-frame output and extract IBAN candidates (default: true).
    pub iban_detection_enabled: bool,

    /// Initial state of the user flash toggle (default: true).
    pub flash_on_by_default: bool,

    /// Camera to select on setup (default: back).
    pub preferred_position: DevicePosition,

    /// Zoom bias applied after setup to help text recognition (default: 2.0).
    pub preferred_zoom_factor: f64,

    /// Recognition candidates requested per text line (default: 10).
    pub max_candidates_per_line: usize,

    /// Bytes returned by `capture()` instead of hitting the hardware.
    #[serde(skip)]
    pub debug_still_image_override: Option<Vec<u8>>,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if !self.preferred_zoom_factor.is_finite() || self.preferred_zoom_factor < 1.0 {
            return Err(format!(
                "zoom factor must be at least 1.0: {}",
                self.preferred_zoom_factor
            ));
        }
        if !(1..=MAX_CANDIDATES_PER_LINE).contains(&self.max_candidates_per_line) {
            return Err(format!(
                "unsupported candidate count: {}",
                self.max_candidates_per_line
            ));
        }
        if matches!(&self.debug_still_image_override, Some(bytes) if bytes.is_empty()) {
            return Err("debug still image override is empty".into());
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("failed to parse configuration: {}", e)))?;
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(config)
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            qr_scanning_enabled: false,
            iban_detection_enabled: true,
            flash_on_by_default: true,
            preferred_position: DevicePosition::Back,
            preferred_zoom_factor: 2.0,
            max_candidates_per_line: MAX_CANDIDATES_PER_LINE,
            debug_still_image_override: None,
        }
    }
}
