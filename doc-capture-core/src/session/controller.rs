use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::device_session::{DeviceCaptureSession, SessionPlan, SessionStatus};
use super::still_capturer::StillImageCapturer;
use crate::analysis::qr_channel::QrCodeSideChannel;
use crate::analysis::text_channel::{TextChannelControl, TextRecognitionSideChannel};
use crate::models::capture_models::{CaptureDiagnostics, VideoFrame};
use crate::models::config::CaptureConfiguration;
use crate::models::device::{CaptureDevice, DeviceAdjustment, DevicePosition};
use crate::models::error::CaptureError;
use crate::models::events::CaptureEvent;
use crate::models::state::SessionState;
use crate::models::still_image::CaptureRequestId;
use crate::queue::delivery::{DeliveryTicket, EventDelivery, EventStream};
use crate::queue::frame_queue::FrameQueue;
use crate::queue::serial_queue::SerialQueue;
use crate::traits::authorization::AuthorizationProvider;
use crate::traits::capture_hardware::{CaptureHardware, OutputBinding};
use crate::traits::orientation::OrientationSource;
use crate::traits::text_recognizer::{RecognitionRequest, TextRecognizer};

const SESSION_QUEUE_LABEL: &str = "doc-capture-session";
const FRAME_QUEUE_LABEL: &str = "doc-capture-frames";

/// Per-setup wiring, installed once the session reports ready.
struct ActiveSession {
    capturer: StillImageCapturer,
    qr: Option<Arc<QrCodeSideChannel>>,
}

/// Single entry point for the UI layer.
///
/// Owns the session queue (hardware mutation), the frame queue (text
/// recognition) and the event channel. Every public method returns
/// without waiting on the camera; results arrive on the `EventStream`
/// returned by [`CaptureController::new`].
pub struct CaptureController<H, R>
where
    H: CaptureHardware + 'static,
    R: TextRecognizer + 'static,
{
    session_queue: SerialQueue<DeviceCaptureSession<H>>,
    frame_queue: FrameQueue<TextRecognitionSideChannel<R>>,
    authorization: Arc<dyn AuthorizationProvider>,
    orientation: Arc<dyn OrientationSource>,
    delivery: EventDelivery,
    status: Arc<Mutex<SessionStatus>>,
    active: Arc<Mutex<Option<ActiveSession>>>,
    flash_enabled: Arc<AtomicBool>,
    diagnostics: Arc<Mutex<CaptureDiagnostics>>,
}

impl<H, R> CaptureController<H, R>
where
    H: CaptureHardware + 'static,
    R: TextRecognizer + 'static,
{
    pub fn new(
        hardware: H,
        recognizer: R,
        authorization: Arc<dyn AuthorizationProvider>,
        orientation: Arc<dyn OrientationSource>,
    ) -> Result<(Self, EventStream), CaptureError> {
        let diagnostics = Arc::new(Mutex::new(CaptureDiagnostics::default()));
        let status = Arc::new(Mutex::new(SessionStatus::default()));
        let (delivery, events) = EventDelivery::channel();

        let session = DeviceCaptureSession::new(hardware, Arc::clone(&status), Arc::clone(&diagnostics));
        let session_queue = SerialQueue::spawn(SESSION_QUEUE_LABEL, session)?;
        let text_channel = TextRecognitionSideChannel::new(recognizer, Arc::clone(&diagnostics));
        let frame_queue = FrameQueue::spawn(FRAME_QUEUE_LABEL, text_channel, Arc::clone(&diagnostics))?;

        let controller = Self {
            session_queue,
            frame_queue,
            authorization,
            orientation,
            delivery,
            status,
            active: Arc::new(Mutex::new(None)),
            flash_enabled: Arc::new(AtomicBool::new(true)),
            diagnostics,
        };
        Ok((controller, events))
    }

    /// Configure and start the session.
    ///
    /// Exactly one `SessionReady` or `SessionFailed` follows, unless the
    /// controller is torn down first. While a session is already running
    /// the call is coalesced and the running configuration is kept.
    pub fn setup(&self, config: CaptureConfiguration) {
        let ticket = self.delivery.ticket();
        if let Err(reason) = config.validate() {
            log::error!("rejecting capture configuration: {}", reason);
            ticket.deliver(CaptureEvent::SessionFailed(CaptureError::ConfigurationFailed(reason)));
            return;
        }

        let qr = config
            .qr_scanning_enabled
            .then(|| Arc::new(QrCodeSideChannel::new(ticket.clone(), Arc::clone(&self.diagnostics))));
        let mut outputs = vec![OutputBinding::StillImage];
        if let Some(qr) = &qr {
            outputs.push(OutputBinding::Metadata(qr.metadata_callback()));
        }
        if config.iban_detection_enabled {
            if let Some(sink) = self.frame_queue.sink() {
                outputs.push(OutputBinding::VideoFrames(Arc::new(move |frame: VideoFrame| {
                    sink.offer(frame);
                })));
            }
        }
        let plan = SessionPlan {
            position: config.preferred_position,
            zoom_factor: config.preferred_zoom_factor,
            outputs,
        };
        let capturer = StillImageCapturer::new(
            ticket.clone(),
            Arc::clone(&self.flash_enabled),
            config.debug_still_image_override.map(Arc::from),
            Arc::clone(&self.orientation),
            Arc::clone(&self.diagnostics),
        );

        let authorization = Arc::clone(&self.authorization);
        let active = Arc::clone(&self.active);
        let flash_enabled = Arc::clone(&self.flash_enabled);
        let frame_controls = self.frame_queue.controls();
        let recognition = RecognitionRequest::for_account_numbers(config.max_candidates_per_line);
        let flash_on_by_default = config.flash_on_by_default;
        let iban_detection = config.iban_detection_enabled;

        let failure_ticket = ticket.clone();
        self.submit_or_fail(&failure_ticket, move |session| {
            if !ticket.is_live() {
                log::debug!("skipping setup queued before teardown");
                return;
            }
            let coalesced = session.state().coalesces_setup() && session.active_device().is_some();

            let device = match session.setup(authorization.as_ref(), plan) {
                Ok(device) => device,
                Err(e) => {
                    active.lock().take();
                    if let Some(controls) = &frame_controls {
                        let _ = controls.send(TextChannelControl::End);
                    }
                    ticket.deliver(CaptureEvent::SessionFailed(e));
                    return;
                }
            };

            if !coalesced {
                {
                    let mut active = active.lock();
                    // Teardown advances the epoch under this lock.
                    if !ticket.is_live() {
                        return;
                    }
                    *active = Some(ActiveSession { capturer, qr });
                }
                flash_enabled.store(flash_on_by_default, Ordering::Release);
                if let Some(controls) = &frame_controls {
                    let control = if iban_detection {
                        TextChannelControl::Begin {
                            ticket: ticket.clone(),
                            request: recognition,
                        }
                    } else {
                        TextChannelControl::End
                    };
                    let _ = controls.send(control);
                }
            }

            let has_flash = device.has_flash;
            ticket.deliver(CaptureEvent::SessionReady { device });
            if !coalesced {
                ticket.deliver(CaptureEvent::FlashAvailabilityChanged(has_flash));
            }
        });
    }

    /// Resume a stopped session. Idempotent.
    pub fn start(&self) {
        self.session_queue.submit(|session| session.start());
    }

    /// Stop the session and clear detection state. Idempotent.
    pub fn stop(&self) {
        let frame_controls = self.frame_queue.controls();
        let qr = self.active.lock().as_ref().and_then(|a| a.qr.clone());
        self.session_queue.submit(move |session| {
            session.stop();
            if let Some(qr) = qr {
                qr.reset();
            }
            if let Some(controls) = frame_controls {
                let _ = controls.send(TextChannelControl::Reset);
            }
        });
    }

    /// Detach all outputs and stop the session.
    ///
    /// Takes effect for delivery immediately: nothing produced by the
    /// current session, including photo completions already in flight,
    /// reaches the event stream afterwards.
    pub fn teardown(&self) {
        {
            let mut active = self.active.lock();
            self.delivery.advance_epoch();
            active.take();
        }
        let frame_controls = self.frame_queue.controls();
        self.session_queue.submit(move |session| {
            session.teardown();
            if let Some(controls) = frame_controls {
                let _ = controls.send(TextChannelControl::End);
            }
        });
        log::info!("capture controller torn down");
    }

    /// Request one still image.
    ///
    /// Fails immediately with `NoInputDevice` when no session is running
    /// and with `CaptureInProgress` while an earlier request is pending.
    /// Otherwise exactly one `StillCaptured` with the returned id follows.
    pub fn capture(&self) -> Result<CaptureRequestId, CaptureError> {
        let capturer = self
            .active
            .lock()
            .as_ref()
            .map(|a| a.capturer.clone())
            .ok_or(CaptureError::NoInputDevice)?;
        if !capturer.has_debug_override() && !self.status.lock().state.is_running() {
            return Err(CaptureError::NoInputDevice);
        }

        let pending = capturer.begin()?;
        let request_id = pending.request_id;
        if !self.session_queue.submit(move |session| capturer.trigger(pending, session)) {
            return Err(CaptureError::NoInputDevice);
        }
        Ok(request_id)
    }

    /// Switch to the camera at `position`; reported with `DeviceSwitched`.
    pub fn switch_device(&self, position: DevicePosition) {
        let ticket = self.delivery.ticket();
        self.session_queue.submit(move |session| {
            let had_flash = session.active_device().map(|d| d.has_flash);
            let result = session.switch_input(position);
            let flash_changed = match &result {
                Ok(device) => had_flash != Some(device.has_flash),
                Err(_) => false,
            };
            let has_flash = result.as_ref().map(|d| d.has_flash).unwrap_or(false);
            ticket.deliver(CaptureEvent::DeviceSwitched(result));
            if flash_changed {
                ticket.deliver(CaptureEvent::FlashAvailabilityChanged(has_flash));
            }
        });
    }

    pub fn set_flash_enabled(&self, enabled: bool) {
        self.flash_enabled.store(enabled, Ordering::Release);
    }

    pub fn flash_enabled(&self) -> bool {
        self.flash_enabled.load(Ordering::Acquire)
    }

    /// Focus and expose at a normalized point of the preview.
    pub fn focus_at(&self, x: f64, y: f64) {
        self.adjust(DeviceAdjustment::FocusAt { x, y });
    }

    /// Zoom, clamped to what the active camera supports.
    pub fn set_zoom(&self, factor: f64) {
        self.adjust(DeviceAdjustment::Zoom(factor));
    }

    fn adjust(&self, adjustment: DeviceAdjustment) {
        self.session_queue.submit(move |session| {
            // DeviceLocked is logged by the session and otherwise ignored.
            let _ = session.adjust_device(adjustment);
        });
    }

    /// Forget all IBAN candidates seen so far.
    pub fn reset_iban_detection(&self) {
        self.frame_queue.control(TextChannelControl::Reset);
    }

    pub fn state(&self) -> SessionState {
        self.status.lock().state.clone()
    }

    pub fn active_device(&self) -> Option<CaptureDevice> {
        self.status.lock().device.clone()
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        self.diagnostics.lock().clone()
    }

    /// Block until every session operation submitted so far has run.
    pub fn flush(&self) {
        self.session_queue.sync(|_| ());
    }

    fn submit_or_fail(
        &self,
        ticket: &DeliveryTicket,
        job: impl FnOnce(&mut DeviceCaptureSession<H>) + Send + 'static,
    ) {
        if !self.session_queue.submit(job) {
            log::error!("{} is not running", self.session_queue.label());
            ticket.deliver(CaptureEvent::SessionFailed(CaptureError::ConfigurationFailed(
                "session queue stopped".into(),
            )));
        }
    }
}

impl<H, R> Drop for CaptureController<H, R>
where
    H: CaptureHardware + 'static,
    R: TextRecognizer + 'static,
{
    fn drop(&mut self) {
        self.teardown();
    }
}
