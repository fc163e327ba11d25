//! Drives a full capture session against the virtual camera and logs every
//! event. Run with `RUST_LOG=debug` to see queue-level decisions.

use std::sync::Arc;
use std::time::Duration;

use doc_capture_core::models::capture_models::{PixelFormat, VideoFrame, VideoOrientation};
use doc_capture_core::{
    CaptureConfiguration, CaptureController, CaptureError, CaptureEvent, DevicePosition, EventStream,
    FixedOrientation,
};
use doc_capture_virtual::{DeviceCatalog, ScriptedAuthorization, ScriptedRecognizer, VirtualCamera};

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

const INVOICE_QR: &str =
    "BCD\n002\n1\nSCT\nCOBADEFFXXX\nACME Office Supplies GmbH\nDE89370400440532013000\nEUR149.90\n\nRE-2024-0815";

fn main() -> Result<(), CaptureError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let camera = VirtualCamera::new(DeviceCatalog::phone());
    let sensor = camera.handle();
    let recognizer = ScriptedRecognizer::new();
    recognizer
        .on_frame(1, &["ACME Office Supplies GmbH", "Invoice RE-2024-0815"])
        .on_frame(2, &["Bank: Commerzbank", "IBAN DE89 3704 0044 0532 0130 00"])
        .otherwise(&["iban de89370400440532013000 BIC COBADEFFXXX"]);

    let (controller, events) = CaptureController::new(
        camera,
        recognizer,
        Arc::new(ScriptedAuthorization::prompt(true)),
        Arc::new(FixedOrientation(VideoOrientation::Portrait)),
    )?;

    controller.setup(CaptureConfiguration {
        qr_scanning_enabled: true,
        ..CaptureConfiguration::default()
    });
    match wait_for(&events, |e| matches!(e, CaptureEvent::SessionReady { .. } | CaptureEvent::SessionFailed(_))) {
        Some(CaptureEvent::SessionFailed(e)) => return Err(e),
        Some(_) => {}
        None => return Err(CaptureError::ConfigurationFailed("session did not become ready".into())),
    }
    log::info!("session on {:?}", controller.active_device().map(|d| d.name));

    for sequence in 1..=4 {
        sensor.push_frame(VideoFrame::new(sequence, 4, 4, PixelFormat::Luma8, vec![128; 16]));
        std::thread::sleep(Duration::from_millis(20));
    }
    sensor.push_metadata(vec![INVOICE_QR.to_string()]);
    sensor.push_metadata(vec![INVOICE_QR.to_string()]);

    let request = controller.capture()?;
    log::info!("capture requested: {}", request);
    wait_for(&events, |e| matches!(e, CaptureEvent::StillCaptured { .. }));

    controller.switch_device(DevicePosition::Front);
    wait_for(&events, |e| matches!(e, CaptureEvent::DeviceSwitched(_)));

    controller.stop();
    controller.flush();
    drain(&events);

    log::info!("diagnostics: {:?}", controller.diagnostics());
    controller.teardown();
    Ok(())
}

/// Log events until one matches `done`.
fn wait_for(events: &EventStream, done: impl Fn(&CaptureEvent) -> bool) -> Option<CaptureEvent> {
    while let Ok(event) = events.recv_timeout(EVENT_TIMEOUT) {
        log_event(&event);
        if done(&event) {
            return Some(event);
        }
    }
    log::warn!("timed out waiting for event");
    None
}

fn drain(events: &EventStream) {
    for event in events.drain() {
        log_event(&event);
    }
}

fn log_event(event: &CaptureEvent) {
    match event {
        CaptureEvent::SessionReady { device } => log::info!("ready: {}", device.name),
        CaptureEvent::SessionFailed(e) => log::error!("setup failed: {}", e),
        CaptureEvent::StillCaptured { request_id, result: Ok(image) } => {
            log::info!("still {}: {} bytes, sha256 {}", request_id, image.jpeg.len(), image.checksum)
        }
        CaptureEvent::StillCaptured { request_id, result: Err(e) } => log::warn!("still {} failed: {}", request_id, e),
        CaptureEvent::QrDetected(payload) => log::info!("QR {:?}: {:?}", payload.format, payload.payment),
        CaptureEvent::IbanCandidates(snapshot) => log::info!("IBAN candidates: {:?}", snapshot.ibans()),
        CaptureEvent::FlashAvailabilityChanged(available) => log::info!("flash available: {}", available),
        CaptureEvent::DeviceSwitched(Ok(device)) => log::info!("switched to {}", device.name),
        CaptureEvent::DeviceSwitched(Err(e)) => log::warn!("switch failed: {}", e),
    }
}
