//! # doc-capture-virtual
//!
//! Virtual camera backend for doc-capture-kit.
//!
//! Provides:
//! - `VirtualCamera`: in-memory capture graph implementing `CaptureHardware`
//! - `DeviceCatalog`: phone-like back/front camera descriptions
//! - `ScriptedAuthorization`: camera permission with a scripted prompt answer
//! - `ScriptedRecognizer`: text recognizer scripted per frame
//! - `qr_decoder`: rqrr-based QR detection on video frames
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use doc_capture_core::{CaptureConfiguration, CaptureController, FixedOrientation};
//! use doc_capture_virtual::{DeviceCatalog, ScriptedAuthorization, ScriptedRecognizer, VirtualCamera};
//!
//! let camera = VirtualCamera::new(DeviceCatalog::phone());
//! let sensor = camera.handle();
//! let (controller, events) = CaptureController::new(
//!     camera,
//!     ScriptedRecognizer::new(),
//!     Arc::new(ScriptedAuthorization::authorized()),
//!     Arc::new(FixedOrientation::default()),
//! )?;
//! controller.setup(CaptureConfiguration::default());
//! ```

pub mod device_catalog;
pub mod permissions;
pub mod qr_decoder;
pub mod recognizer;
pub mod virtual_camera;

pub use device_catalog::DeviceCatalog;
pub use permissions::ScriptedAuthorization;
pub use recognizer::ScriptedRecognizer;
pub use virtual_camera::{VirtualCamera, VirtualCameraHandle};
