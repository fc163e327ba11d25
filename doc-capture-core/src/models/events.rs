use std::sync::Arc;

use super::device::CaptureDevice;
use super::error::CaptureError;
use super::qr::QrPayload;
use super::still_image::{CaptureRequestId, StillImage};

/// Immutable copy of the IBAN candidate set, in detection order.
///
/// An empty snapshot means "nothing detected": the UI retracts its overlay.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IbanSnapshot {
    ibans: Arc<[String]>,
}

impl IbanSnapshot {
    pub fn new(ibans: Vec<String>) -> Self {
        Self { ibans: ibans.into() }
    }

    pub fn ibans(&self) -> &[String] {
        &self.ibans
    }

    pub fn is_empty(&self) -> bool {
        self.ibans.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ibans.len()
    }
}

/// Everything the core reports to the UI layer, over one event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// Exactly one `SessionReady` or `SessionFailed` follows each `setup()`.
    SessionReady { device: CaptureDevice },
    SessionFailed(CaptureError),

    /// Result of one accepted `capture()` call.
    StillCaptured {
        request_id: CaptureRequestId,
        result: Result<StillImage, CaptureError>,
    },

    QrDetected(QrPayload),
    IbanCandidates(IbanSnapshot),
    FlashAvailabilityChanged(bool),

    /// Result of `switch_device()`; on failure the previous device stays active.
    DeviceSwitched(Result<CaptureDevice, CaptureError>),
}
