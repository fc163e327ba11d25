use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::capture_models::VideoOrientation;
use super::device::DevicePosition;

/// Identifies one `capture()` call and its single result event.
pub type CaptureRequestId = Uuid;

/// An encoded still image handed to the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub struct StillImage {
    pub request_id: CaptureRequestId,
    /// JPEG bytes.
    pub jpeg: Vec<u8>,
    /// SHA-256 of `jpeg`, lowercase hex.
    pub checksum: String,
    pub captured_at: DateTime<Utc>,
    pub orientation: VideoOrientation,
    /// `None` when the image came from the debug override.
    pub device_position: Option<DevicePosition>,
}

impl StillImage {
    pub fn from_debug_override(&self) -> bool {
        self.device_position.is_none()
    }
}
