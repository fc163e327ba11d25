use std::sync::Arc;

use parking_lot::Mutex;

use super::qr_formats;
use crate::models::capture_models::CaptureDiagnostics;
use crate::models::events::CaptureEvent;
use crate::models::qr::{QrPayload, QrValidity};
use crate::queue::delivery::DeliveryTicket;
use crate::traits::capture_hardware::MetadataCallback;

/// Reports payment QR codes from the metadata output.
///
/// Runs on the hardware's metadata callback thread. Validation is cheap
/// string work, so results go straight to the delivery channel. A code
/// that stays in view is reported once; it is reported again only after a
/// different code was emitted or the channel was reset.
pub struct QrCodeSideChannel {
    ticket: DeliveryTicket,
    last_emitted: Mutex<Option<String>>,
    diagnostics: Arc<Mutex<CaptureDiagnostics>>,
}

impl QrCodeSideChannel {
    pub fn new(ticket: DeliveryTicket, diagnostics: Arc<Mutex<CaptureDiagnostics>>) -> Self {
        Self {
            ticket,
            last_emitted: Mutex::new(None),
            diagnostics,
        }
    }

    /// Callback to attach as the metadata output.
    pub fn metadata_callback(self: &Arc<Self>) -> MetadataCallback {
        let channel = Arc::clone(self);
        Arc::new(move |decoded: Vec<String>| channel.handle_metadata(decoded))
    }

    pub fn handle_metadata(&self, decoded: Vec<String>) {
        for raw in decoded {
            self.process(raw);
        }
    }

    /// Validate one decoded string and emit it if it is new and recognized.
    pub fn process(&self, raw: String) -> Option<QrPayload> {
        if self.last_emitted.lock().as_deref() == Some(raw.as_str()) {
            return None;
        }

        let payload = qr_formats::classify(&raw);
        if payload.validity == QrValidity::Unrecognized {
            log::debug!("ignoring unrecognized QR payload ({} bytes)", raw.len());
            return None;
        }

        {
            let mut last = self.last_emitted.lock();
            // Another metadata callback may have emitted the same code meanwhile.
            if last.as_deref() == Some(raw.as_str()) {
                return None;
            }
            *last = Some(raw);
        }

        log::info!("QR payload detected: {:?} {:?}", payload.format, payload.validity);
        self.diagnostics.lock().qr_payloads_emitted += 1;
        self.ticket.deliver(CaptureEvent::QrDetected(payload.clone()));
        Some(payload)
    }

    /// Forget the last emitted code.
    pub fn reset(&self) {
        *self.last_emitted.lock() = None;
    }
}
