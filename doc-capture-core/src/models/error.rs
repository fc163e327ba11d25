use thiserror::Error;

/// Errors surfaced by the capture core to the UI layer.
///
/// Hardware and session-level variants (`NoInputDevice`,
/// `NotAuthorizedToUseDevice`) end a setup flow. Per-operation variants
/// (`CaptureFailed`, `DeviceLocked`, `CaptureInProgress`) never tear the
/// session down.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no usable camera input device")]
    NoInputDevice,

    #[error("not authorized to use the camera")]
    NotAuthorizedToUseDevice,

    #[error("still capture failed: {0}")]
    CaptureFailed(String),

    #[error("device configuration locked: {0}")]
    DeviceLocked(String),

    #[error("a still capture is already in flight")]
    CaptureInProgress,

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),
}

impl CaptureError {
    /// Whether this error ends the current session (as opposed to a single
    /// operation).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoInputDevice | Self::NotAuthorizedToUseDevice)
    }
}

/// Errors reported by a `CaptureHardware` implementation.
///
/// Never forwarded as-is; the session maps them into `CaptureError`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HardwareError {
    #[error("input rejected by capture graph: {0}")]
    InputRejected(String),

    #[error("output rejected by capture graph")]
    OutputRejected,

    #[error("device lock failed: {0}")]
    LockFailed(String),

    #[error("photo capture failed: {0}")]
    PhotoFailed(String),

    #[error("hardware unavailable: {0}")]
    Unavailable(String),
}

/// A single frame's text-recognition failure. Always absorbed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("text recognition failed: {0}")]
pub struct RecognitionError(pub String);

/// Structural failure of a recognized payment-QR dialect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QrParseError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid {field}: {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("unsupported {field}: {value}")]
    Unsupported { field: &'static str, value: String },

    #[error("malformed uri: {0}")]
    MalformedUri(String),
}
