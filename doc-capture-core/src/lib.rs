//! # doc-capture-core
//!
//! Platform-agnostic document camera core.
//!
//! Drives a camera session for invoice capture: still images on demand,
//! payment QR codes and IBAN candidates from the live stream. Platform
//! backends implement the `CaptureHardware` capability set and plug into
//! the generic `CaptureController`.
//!
//! ## Architecture
//!
//! ```text
//! doc-capture-core (this crate)
//! ├── traits/       ← CaptureHardware, AuthorizationProvider, TextRecognizer, OrientationSource
//! ├── models/       ← CaptureError, SessionState, CaptureConfiguration, CaptureEvent, etc.
//! ├── queue/        ← SerialQueue (session queue), FrameQueue, EventDelivery
//! ├── analysis/     ← IBAN extraction, payment QR formats, QR and text side channels
//! ├── processing/   ← JPEG encoding and checksums
//! └── session/      ← DeviceCaptureSession, StillImageCapturer, CaptureController
//! ```

pub mod analysis;
pub mod models;
pub mod processing;
pub mod queue;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use analysis::iban::IbanCandidateSet;
pub use analysis::qr_channel::QrCodeSideChannel;
pub use analysis::text_channel::TextRecognitionSideChannel;
pub use models::capture_models::{CaptureDiagnostics, CaptureSettings, PixelFormat, RawPhoto, VideoFrame, VideoOrientation};
pub use models::config::CaptureConfiguration;
pub use models::device::{CaptureDevice, DevicePosition, OutputKind, ResolutionPreset};
pub use models::error::{CaptureError, HardwareError, RecognitionError};
pub use models::events::{CaptureEvent, IbanSnapshot};
pub use models::qr::{QrFormat, QrPayload, QrValidity};
pub use models::state::SessionState;
pub use models::still_image::{CaptureRequestId, StillImage};
pub use queue::delivery::EventStream;
pub use session::controller::CaptureController;
pub use session::device_session::DeviceCaptureSession;
pub use session::still_capturer::StillImageCapturer;
pub use traits::authorization::{AuthorizationProvider, AuthorizationStatus};
pub use traits::capture_hardware::{CaptureHardware, MetadataCallback, OutputBinding, PhotoCallback, VideoFrameCallback};
pub use traits::orientation::{FixedOrientation, OrientationSource};
pub use traits::text_recognizer::{RecognitionRequest, RecognizedLine, TextRecognizer};
