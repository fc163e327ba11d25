use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use super::device_session::DeviceCaptureSession;
use crate::models::capture_models::{CaptureDiagnostics, VideoOrientation};
use crate::models::device::DevicePosition;
use crate::models::error::CaptureError;
use crate::models::events::CaptureEvent;
use crate::models::still_image::{CaptureRequestId, StillImage};
use crate::processing::jpeg;
use crate::queue::delivery::DeliveryTicket;
use crate::traits::capture_hardware::CaptureHardware;
use crate::traits::orientation::OrientationSource;

/// A capture accepted by `StillImageCapturer::begin`, not yet triggered.
#[derive(Debug)]
pub struct PendingCapture {
    pub request_id: CaptureRequestId,
    pub orientation: VideoOrientation,
}

/// Produces one encoded still image per accepted capture request.
///
/// One request may be in flight at a time; `begin` rejects a second one
/// with `CaptureInProgress` until the first has delivered its result.
#[derive(Clone)]
pub struct StillImageCapturer {
    ticket: DeliveryTicket,
    in_flight: Arc<AtomicBool>,
    flash_enabled: Arc<AtomicBool>,
    debug_override: Option<Arc<[u8]>>,
    orientation: Arc<dyn OrientationSource>,
    diagnostics: Arc<Mutex<CaptureDiagnostics>>,
}

impl StillImageCapturer {
    pub fn new(
        ticket: DeliveryTicket,
        flash_enabled: Arc<AtomicBool>,
        debug_override: Option<Arc<[u8]>>,
        orientation: Arc<dyn OrientationSource>,
        diagnostics: Arc<Mutex<CaptureDiagnostics>>,
    ) -> Self {
        Self {
            ticket,
            in_flight: Arc::new(AtomicBool::new(false)),
            flash_enabled,
            debug_override,
            orientation,
            diagnostics,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn has_debug_override(&self) -> bool {
        self.debug_override.is_some()
    }

    /// Reserve the capture slot and read the UI orientation.
    pub fn begin(&self) -> Result<PendingCapture, CaptureError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CaptureError::CaptureInProgress);
        }
        Ok(PendingCapture {
            request_id: Uuid::new_v4(),
            orientation: self.orientation.current_orientation(),
        })
    }

    /// Issue the capture. Runs on the session queue.
    ///
    /// The result is delivered exactly once, either from here or from the
    /// hardware's photo completion.
    pub fn trigger<H: CaptureHardware>(&self, pending: PendingCapture, session: &mut DeviceCaptureSession<H>) {
        let PendingCapture { request_id, orientation } = pending;

        if let Some(bytes) = &self.debug_override {
            log::debug!("capture {}: using debug still image override", request_id);
            let result = jpeg::ensure_jpeg(bytes).map(|data| still_image(request_id, data, orientation, None));
            self.finish(request_id, result);
            return;
        }

        if !session.has_video_connection() {
            self.finish(request_id, Err(CaptureError::NoInputDevice));
            return;
        }
        let flash = self.flash_enabled.load(Ordering::Acquire);
        let Some(settings) = session.capture_settings(flash, orientation) else {
            self.finish(request_id, Err(CaptureError::NoInputDevice));
            return;
        };
        let position = session.active_device().map(|d| d.position);

        log::debug!("capture {}: triggering with {:?}", request_id, settings);
        let capturer = self.clone();
        session.capture_photo(
            &settings,
            Box::new(move |result| {
                let result = result
                    .map_err(|e| CaptureError::CaptureFailed(e.to_string()))
                    .and_then(jpeg::photo_to_jpeg)
                    .map(|data| still_image(request_id, data, orientation, position));
                capturer.finish(request_id, result);
            }),
        );
    }

    fn finish(&self, request_id: CaptureRequestId, result: Result<StillImage, CaptureError>) {
        {
            let mut d = self.diagnostics.lock();
            match &result {
                Ok(_) => d.stills_captured += 1,
                Err(_) => d.still_failures += 1,
            }
        }
        match &result {
            Ok(image) => log::info!("capture {}: {} bytes ({})", request_id, image.jpeg.len(), image.checksum),
            Err(e) if e.is_fatal() => log::error!("capture {}: {}", request_id, e),
            Err(e) => log::warn!("capture {}: {}", request_id, e),
        }
        // Free the slot first so the UI can capture again on receipt.
        self.in_flight.store(false, Ordering::Release);
        self.ticket.deliver(CaptureEvent::StillCaptured { request_id, result });
    }
}

fn still_image(
    request_id: CaptureRequestId,
    data: Vec<u8>,
    orientation: VideoOrientation,
    device_position: Option<DevicePosition>,
) -> StillImage {
    StillImage {
        request_id,
        checksum: jpeg::sha256_hex(&data),
        jpeg: data,
        captured_at: Utc::now(),
        orientation,
        device_position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::capture_models::CaptureSettings;
    use crate::models::device::{CaptureDevice, DeviceAdjustment, OutputKind, ResolutionPreset};
    use crate::models::error::HardwareError;
    use crate::queue::delivery::EventDelivery;
    use crate::session::device_session::SessionStatus;
    use crate::traits::capture_hardware::{OutputBinding, PhotoCallback};
    use crate::traits::orientation::FixedOrientation;

    /// A graph with no cameras; any photo request is a test failure.
    struct NoCamera;

    impl CaptureHardware for NoCamera {
        fn available_devices(&self) -> Vec<CaptureDevice> {
            Vec::new()
        }
        fn begin_configuration(&mut self) {}
        fn commit_configuration(&mut self) {}
        fn configure_input(&mut self, _device: &CaptureDevice) -> Result<(), HardwareError> {
            Err(HardwareError::Unavailable("no camera".into()))
        }
        fn remove_input(&mut self, _device_id: &str) {}
        fn can_add_output(&self, _kind: OutputKind) -> bool {
            false
        }
        fn attach_output(&mut self, _output: OutputBinding) -> Result<(), HardwareError> {
            Err(HardwareError::OutputRejected)
        }
        fn remove_output(&mut self, _kind: OutputKind) {}
        fn supports_preset(&self, _preset: ResolutionPreset) -> bool {
            false
        }
        fn apply_preset(&mut self, _preset: ResolutionPreset) {}
        fn lock_for_device_adjustment(&mut self, _adjustment: DeviceAdjustment) -> Result<(), HardwareError> {
            Err(HardwareError::Unavailable("no camera".into()))
        }
        fn start_running(&mut self) {}
        fn stop_running(&mut self) {}
        fn has_video_connection(&self) -> bool {
            false
        }
        fn capture_photo(&mut self, _settings: &CaptureSettings, _completion: PhotoCallback) {
            panic!("hardware touched without a video connection");
        }
    }

    fn session() -> DeviceCaptureSession<NoCamera> {
        DeviceCaptureSession::new(
            NoCamera,
            Arc::new(Mutex::new(SessionStatus::default())),
            Arc::new(Mutex::new(CaptureDiagnostics::default())),
        )
    }

    fn capturer(ticket: DeliveryTicket, debug_override: Option<&[u8]>) -> StillImageCapturer {
        StillImageCapturer::new(
            ticket,
            Arc::new(AtomicBool::new(true)),
            debug_override.map(Arc::from),
            Arc::new(FixedOrientation(VideoOrientation::LandscapeLeft)),
            Arc::new(Mutex::new(CaptureDiagnostics::default())),
        )
    }

    #[test]
    fn no_video_connection_fails_fast() {
        let (delivery, stream) = EventDelivery::channel();
        let capturer = capturer(delivery.ticket(), None);
        let pending = capturer.begin().unwrap();
        let id = pending.request_id;
        capturer.trigger(pending, &mut session());

        assert_eq!(
            stream.try_recv().unwrap(),
            CaptureEvent::StillCaptured {
                request_id: id,
                result: Err(CaptureError::NoInputDevice),
            }
        );
        assert!(!capturer.is_busy());
    }

    #[test]
    fn second_capture_is_rejected_while_pending() {
        let (delivery, _stream) = EventDelivery::channel();
        let capturer = capturer(delivery.ticket(), None);
        let pending = capturer.begin().unwrap();

        assert_eq!(capturer.clone().begin().unwrap_err(), CaptureError::CaptureInProgress);
        capturer.trigger(pending, &mut session());
        assert!(capturer.begin().is_ok());
    }

    #[test]
    fn debug_override_skips_hardware() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xDB, 0x00];
        let (delivery, stream) = EventDelivery::channel();
        let capturer = capturer(delivery.ticket(), Some(&bytes));
        let pending = capturer.begin().unwrap();
        assert_eq!(pending.orientation, VideoOrientation::LandscapeLeft);
        capturer.trigger(pending, &mut session());

        match stream.try_recv().unwrap() {
            CaptureEvent::StillCaptured { result: Ok(image), .. } => {
                assert_eq!(image.jpeg, bytes);
                assert!(image.from_debug_override());
                assert_eq!(image.checksum, jpeg::sha256_hex(&bytes));
                assert_eq!(image.orientation, VideoOrientation::LandscapeLeft);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn result_after_teardown_is_dropped() {
        let (delivery, stream) = EventDelivery::channel();
        let capturer = capturer(delivery.ticket(), None);
        let pending = capturer.begin().unwrap();
        delivery.advance_epoch();
        capturer.trigger(pending, &mut session());

        assert!(stream.drain().is_empty());
        assert_eq!(capturer.diagnostics.lock().still_failures, 1);
    }
}
