//! Software capture graph.
//!
//! `VirtualCamera` implements the `CaptureHardware` capability set entirely
//! in memory. The session owns the camera; tests and the demo drive it
//! through a `VirtualCameraHandle`: pushing frames and decoded QR strings
//! the way a sensor would, and injecting failures (rejected inputs, refused
//! outputs, busy locks, failing or stalled photos).

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use doc_capture_core::models::capture_models::{CaptureSettings, PhotoEncoding, RawPhoto, VideoFrame};
use doc_capture_core::models::device::{CaptureDevice, DeviceAdjustment, OutputKind, ResolutionPreset};
use doc_capture_core::models::error::HardwareError;
use doc_capture_core::traits::capture_hardware::{
    CaptureHardware, MetadataCallback, OutputBinding, PhotoCallback, VideoFrameCallback,
};

use crate::qr_decoder;

/// A tiny baseline JPEG (SOI, APP0, EOI) returned when no photo is scripted.
const PLACEHOLDER_JPEG: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00,
    0x01, 0x00, 0x00, 0xFF, 0xD9,
];

type ShutterJob = (PhotoCallback, Result<RawPhoto, HardwareError>);

struct Graph {
    devices: Vec<CaptureDevice>,
    input: Option<CaptureDevice>,
    outputs: Vec<OutputKind>,
    metadata: Option<MetadataCallback>,
    video: Option<VideoFrameCallback>,
    preset: Option<ResolutionPreset>,
    running: bool,

    // Failure injection.
    rejected_inputs: HashSet<String>,
    refused_outputs: HashSet<OutputKind>,
    lock_failure: Option<String>,
    photo_failure: Option<String>,
    hold_photos: bool,
    held: Vec<ShutterJob>,
    photo: RawPhoto,
    decode_qr: bool,

    // Accounting.
    open_transactions: usize,
    max_open_transactions: usize,
    committed_transactions: usize,
    adjustments: Vec<DeviceAdjustment>,
    photo_requests: Vec<CaptureSettings>,
    frames_pushed: u64,
}

impl Graph {
    fn new(devices: Vec<CaptureDevice>) -> Self {
        Self {
            devices,
            input: None,
            outputs: Vec::new(),
            metadata: None,
            video: None,
            preset: None,
            running: false,
            rejected_inputs: HashSet::new(),
            refused_outputs: HashSet::new(),
            lock_failure: None,
            photo_failure: None,
            hold_photos: false,
            held: Vec::new(),
            photo: RawPhoto {
                data: PLACEHOLDER_JPEG.to_vec(),
                encoding: PhotoEncoding::Jpeg,
            },
            decode_qr: false,
            open_transactions: 0,
            max_open_transactions: 0,
            committed_transactions: 0,
            adjustments: Vec::new(),
            photo_requests: Vec::new(),
            frames_pushed: 0,
        }
    }
}

/// In-memory camera session.
pub struct VirtualCamera {
    graph: Arc<Mutex<Graph>>,
    shutter: Option<Sender<ShutterJob>>,
    shutter_handle: Option<JoinHandle<()>>,
}

impl VirtualCamera {
    pub fn new(devices: Vec<CaptureDevice>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded::<ShutterJob>();
        let spawned = thread::Builder::new()
            .name("virtual-shutter".into())
            .spawn(move || {
                for (completion, result) in receiver.iter() {
                    completion(result);
                }
            });
        let (shutter, shutter_handle) = match spawned {
            Ok(handle) => (Some(sender), Some(handle)),
            Err(e) => {
                log::error!("failed to spawn shutter thread, completing photos inline: {}", e);
                (None, None)
            }
        };
        Self {
            graph: Arc::new(Mutex::new(Graph::new(devices))),
            shutter,
            shutter_handle,
        }
    }

    /// Handle for driving the camera after it has been moved into a session.
    pub fn handle(&self) -> VirtualCameraHandle {
        VirtualCameraHandle {
            graph: Arc::clone(&self.graph),
        }
    }

    fn complete(&self, job: ShutterJob) {
        let job = match &self.shutter {
            Some(sender) => match sender.send(job) {
                Ok(()) => return,
                Err(returned) => returned.0,
            },
            None => job,
        };
        let (completion, result) = job;
        completion(result);
    }
}

impl Drop for VirtualCamera {
    fn drop(&mut self) {
        self.shutter.take();
        if let Some(handle) = self.shutter_handle.take() {
            let _ = handle.join();
        }
    }
}

impl CaptureHardware for VirtualCamera {
    fn available_devices(&self) -> Vec<CaptureDevice> {
        self.graph.lock().devices.clone()
    }

    fn begin_configuration(&mut self) {
        let mut g = self.graph.lock();
        g.open_transactions += 1;
        g.max_open_transactions = g.max_open_transactions.max(g.open_transactions);
    }

    fn commit_configuration(&mut self) {
        let mut g = self.graph.lock();
        if g.open_transactions == 0 {
            log::error!("commit without an open configuration transaction");
            return;
        }
        g.open_transactions -= 1;
        g.committed_transactions += 1;
    }

    fn configure_input(&mut self, device: &CaptureDevice) -> Result<(), HardwareError> {
        let mut g = self.graph.lock();
        if g.open_transactions == 0 {
            return Err(HardwareError::Unavailable("input change outside a transaction".into()));
        }
        if g.rejected_inputs.contains(&device.id) {
            return Err(HardwareError::InputRejected(device.name.clone()));
        }
        if let Some(current) = &g.input {
            return Err(HardwareError::InputRejected(format!(
                "{} already connected",
                current.name
            )));
        }
        g.input = Some(device.clone());
        Ok(())
    }

    fn remove_input(&mut self, device_id: &str) {
        let mut g = self.graph.lock();
        if g.input.as_ref().is_some_and(|d| d.id == device_id) {
            g.input = None;
        }
    }

    fn can_add_output(&self, kind: OutputKind) -> bool {
        let g = self.graph.lock();
        !g.refused_outputs.contains(&kind) && !g.outputs.contains(&kind)
    }

    fn attach_output(&mut self, output: OutputBinding) -> Result<(), HardwareError> {
        let mut g = self.graph.lock();
        let kind = output.kind();
        if g.open_transactions == 0 || g.refused_outputs.contains(&kind) || g.outputs.contains(&kind) {
            return Err(HardwareError::OutputRejected);
        }
        match output {
            OutputBinding::StillImage => {}
            OutputBinding::Metadata(callback) => g.metadata = Some(callback),
            OutputBinding::VideoFrames(callback) => g.video = Some(callback),
        }
        g.outputs.push(kind);
        Ok(())
    }

    fn remove_output(&mut self, kind: OutputKind) {
        let mut g = self.graph.lock();
        g.outputs.retain(|k| *k != kind);
        match kind {
            OutputKind::StillImage => {}
            OutputKind::Metadata => g.metadata = None,
            OutputKind::VideoFrames => g.video = None,
        }
    }

    fn supports_preset(&self, preset: ResolutionPreset) -> bool {
        self.graph
            .lock()
            .input
            .as_ref()
            .is_some_and(|d| d.supports_preset(preset))
    }

    fn apply_preset(&mut self, preset: ResolutionPreset) {
        self.graph.lock().preset = Some(preset);
    }

    fn lock_for_device_adjustment(&mut self, adjustment: DeviceAdjustment) -> Result<(), HardwareError> {
        let mut g = self.graph.lock();
        if g.input.is_none() {
            return Err(HardwareError::Unavailable("no input connected".into()));
        }
        if let Some(reason) = &g.lock_failure {
            return Err(HardwareError::LockFailed(reason.clone()));
        }
        g.adjustments.push(adjustment);
        Ok(())
    }

    fn start_running(&mut self) {
        self.graph.lock().running = true;
    }

    fn stop_running(&mut self) {
        self.graph.lock().running = false;
    }

    fn has_video_connection(&self) -> bool {
        let g = self.graph.lock();
        g.running && g.input.is_some() && g.outputs.contains(&OutputKind::StillImage)
    }

    fn capture_photo(&mut self, settings: &CaptureSettings, completion: PhotoCallback) {
        let job = {
            let mut g = self.graph.lock();
            g.photo_requests.push(settings.clone());
            let result = match g.photo_failure.take() {
                Some(reason) => Err(HardwareError::PhotoFailed(reason)),
                None => Ok(g.photo.clone()),
            };
            if g.hold_photos {
                g.held.push((completion, result));
                return;
            }
            (completion, result)
        };
        self.complete(job);
    }
}

/// Test/demo handle onto a `VirtualCamera`.
#[derive(Clone)]
pub struct VirtualCameraHandle {
    graph: Arc<Mutex<Graph>>,
}

impl VirtualCameraHandle {
    /// Deliver a frame as the sensor would. Returns false if no video
    /// output is attached or the session is not running.
    ///
    /// With QR decoding enabled the frame also feeds the metadata output.
    pub fn push_frame(&self, frame: VideoFrame) -> bool {
        let (video, metadata) = {
            let mut g = self.graph.lock();
            if !g.running {
                return false;
            }
            g.frames_pushed += 1;
            let metadata = if g.decode_qr { g.metadata.clone() } else { None };
            (g.video.clone(), metadata)
        };
        if let Some(metadata) = metadata {
            let decoded = qr_decoder::decode_frame(&frame);
            if !decoded.is_empty() {
                metadata(decoded);
            }
        }
        match video {
            Some(video) => {
                video(frame);
                true
            }
            None => false,
        }
    }

    /// Deliver already-decoded machine-readable codes. Returns false if no
    /// metadata output is attached or the session is not running.
    pub fn push_metadata(&self, decoded: Vec<String>) -> bool {
        let metadata = {
            let g = self.graph.lock();
            if !g.running {
                return false;
            }
            g.metadata.clone()
        };
        match metadata {
            Some(metadata) => {
                metadata(decoded);
                true
            }
            None => false,
        }
    }

    pub fn set_devices(&self, devices: Vec<CaptureDevice>) {
        self.graph.lock().devices = devices;
    }

    pub fn reject_input(&self, device_id: &str) {
        self.graph.lock().rejected_inputs.insert(device_id.into());
    }

    pub fn refuse_output(&self, kind: OutputKind) {
        self.graph.lock().refused_outputs.insert(kind);
    }

    /// Make every device-lock attempt fail with `reason`.
    pub fn fail_device_lock(&self, reason: Option<&str>) {
        self.graph.lock().lock_failure = reason.map(str::to_string);
    }

    /// Fail the next photo request with `reason`.
    pub fn fail_next_photo(&self, reason: &str) {
        self.graph.lock().photo_failure = Some(reason.into());
    }

    /// Photo data returned by subsequent captures.
    pub fn set_photo(&self, photo: RawPhoto) {
        self.graph.lock().photo = photo;
    }

    /// Stall photo completions until `release_photos`.
    pub fn hold_photos(&self, hold: bool) {
        self.graph.lock().hold_photos = hold;
    }

    /// Complete all stalled photos on the calling thread. Returns how many.
    pub fn release_photos(&self) -> usize {
        let held = std::mem::take(&mut self.graph.lock().held);
        let count = held.len();
        for (completion, result) in held {
            completion(result);
        }
        count
    }

    pub fn held_photos(&self) -> usize {
        self.graph.lock().held.len()
    }

    /// Run pushed frames through the QR decoder.
    pub fn decode_qr_from_frames(&self, enabled: bool) {
        self.graph.lock().decode_qr = enabled;
    }

    pub fn active_input(&self) -> Option<CaptureDevice> {
        self.graph.lock().input.clone()
    }

    pub fn outputs(&self) -> Vec<OutputKind> {
        self.graph.lock().outputs.clone()
    }

    pub fn is_running(&self) -> bool {
        self.graph.lock().running
    }

    pub fn preset(&self) -> Option<ResolutionPreset> {
        self.graph.lock().preset
    }

    /// Highest number of simultaneously open configuration transactions.
    pub fn max_open_transactions(&self) -> usize {
        self.graph.lock().max_open_transactions
    }

    pub fn committed_transactions(&self) -> usize {
        self.graph.lock().committed_transactions
    }

    pub fn adjustments(&self) -> Vec<DeviceAdjustment> {
        self.graph.lock().adjustments.clone()
    }

    pub fn photo_requests(&self) -> Vec<CaptureSettings> {
        self.graph.lock().photo_requests.clone()
    }

    pub fn frames_pushed(&self) -> u64 {
        self.graph.lock().frames_pushed
    }
}
