use std::sync::Arc;

use crate::models::capture_models::{CaptureSettings, RawPhoto, VideoFrame};
use crate::models::device::{CaptureDevice, DeviceAdjustment, OutputKind, ResolutionPreset};
use crate::models::error::HardwareError;

/// Callback invoked for every frame the video-frame output produces.
///
/// Fires on the hardware's capture thread; keep it non-blocking.
pub type VideoFrameCallback = Arc<dyn Fn(VideoFrame) + Send + Sync + 'static>;

/// Callback invoked with the decoded strings of machine-readable codes
/// currently in view.
pub type MetadataCallback = Arc<dyn Fn(Vec<String>) + Send + Sync + 'static>;

/// Completion for a single still-photo request. Called exactly once, from
/// any thread.
pub type PhotoCallback = Box<dyn FnOnce(Result<RawPhoto, HardwareError>) + Send + 'static>;

/// An output to attach, together with the callback it drives.
#[derive(Clone)]
pub enum OutputBinding {
    StillImage,
    Metadata(MetadataCallback),
    VideoFrames(VideoFrameCallback),
}

impl OutputBinding {
    pub fn kind(&self) -> OutputKind {
        match self {
            Self::StillImage => OutputKind::StillImage,
            Self::Metadata(_) => OutputKind::Metadata,
            Self::VideoFrames(_) => OutputKind::VideoFrames,
        }
    }
}

impl std::fmt::Debug for OutputBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OutputBinding({:?})", self.kind())
    }
}

/// Capability set of a platform camera session.
///
/// Implemented by native backends and by `doc-capture-virtual`'s
/// `VirtualCamera`. All methods are called from the session queue only, so
/// implementations never see concurrent configuration calls.
pub trait CaptureHardware: Send {
    /// Cameras currently present.
    fn available_devices(&self) -> Vec<CaptureDevice>;

    /// Open a configuration transaction. Graph changes between
    /// `begin_configuration` and `commit_configuration` apply atomically.
    fn begin_configuration(&mut self);

    fn commit_configuration(&mut self);

    /// Add `device` as the session input.
    fn configure_input(&mut self, device: &CaptureDevice) -> Result<(), HardwareError>;

    fn remove_input(&mut self, device_id: &str);

    fn can_add_output(&self, kind: OutputKind) -> bool;

    fn attach_output(&mut self, output: OutputBinding) -> Result<(), HardwareError>;

    fn remove_output(&mut self, kind: OutputKind);

    /// Whether the graph can run at `preset` with the current input.
    fn supports_preset(&self, preset: ResolutionPreset) -> bool;

    fn apply_preset(&mut self, preset: ResolutionPreset);

    /// Take the device configuration lock, apply `adjustment`, release.
    fn lock_for_device_adjustment(&mut self, adjustment: DeviceAdjustment) -> Result<(), HardwareError>;

    fn start_running(&mut self);

    fn stop_running(&mut self);

    /// Whether the still-image output has a live video connection.
    fn has_video_connection(&self) -> bool;

    /// Trigger the shutter. `completion` fires once the photo is processed.
    fn capture_photo(&mut self, settings: &CaptureSettings, completion: PhotoCallback);
}
