use serde::{Deserialize, Serialize};

/// Which side of the device a camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePosition {
    #[default]
    Back,
    Front,
}

/// Session resolution presets, ordered from lowest to highest resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResolutionPreset {
    Vga640x480,
    Hd1280x720,
    Hd1920x1080,
    Uhd3840x2160,
    Photo,
}

impl ResolutionPreset {
    /// Presets in negotiation order: highest resolution first, since small
    /// invoice text needs every pixel.
    pub const BY_PREFERENCE: [ResolutionPreset; 5] = [
        Self::Photo,
        Self::Uhd3840x2160,
        Self::Hd1920x1080,
        Self::Hd1280x720,
        Self::Vga640x480,
    ];
}

/// A physical camera. Immutable once selected; replaced on device switch.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureDevice {
    pub id: String,
    pub name: String,
    pub position: DevicePosition,
    pub has_flash: bool,
    pub max_zoom_factor: f64,
    pub supports_near_focus: bool,
    pub supported_presets: Vec<ResolutionPreset>,
}

impl CaptureDevice {
    pub fn supports_preset(&self, preset: ResolutionPreset) -> bool {
        self.supported_presets.contains(&preset)
    }

    /// Clamp a requested zoom factor to what the device can do.
    pub fn clamp_zoom(&self, factor: f64) -> f64 {
        factor.clamp(1.0, self.max_zoom_factor.max(1.0))
    }
}

/// Outputs that can be attached to the capture graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    StillImage,
    Metadata,
    VideoFrames,
}

impl OutputKind {
    /// A graph holds at most one output of each kind.
    pub fn conflicts_with(&self, other: OutputKind) -> bool {
        *self == other
    }
}

/// Adjustments applied under the device configuration lock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceAdjustment {
    Zoom(f64),
    /// Restrict autofocus to the near range (documents are held close).
    NearFocus,
    /// Focus and expose at a normalized point (0.0..=1.0 on both axes).
    FocusAt { x: f64, y: f64 },
}

impl DeviceAdjustment {
    pub fn is_finite(&self) -> bool {
        match *self {
            Self::Zoom(factor) => factor.is_finite(),
            Self::NearFocus => true,
            Self::FocusAt { x, y } => x.is_finite() && y.is_finite(),
        }
    }
}
