use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::capture_models::{CaptureDiagnostics, CaptureSettings, VideoOrientation};
use crate::models::device::{CaptureDevice, DeviceAdjustment, DevicePosition, OutputKind, ResolutionPreset};
use crate::models::error::CaptureError;
use crate::models::state::SessionState;
use crate::traits::authorization::{AuthorizationProvider, AuthorizationStatus};
use crate::traits::capture_hardware::{CaptureHardware, OutputBinding, PhotoCallback};

/// Read-only mirror of the session, readable from any thread.
#[derive(Debug, Clone, Default)]
pub struct SessionStatus {
    pub state: SessionState,
    pub device: Option<CaptureDevice>,
}

/// What a setup should build.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub position: DevicePosition,
    pub zoom_factor: f64,
    pub outputs: Vec<OutputBinding>,
}

/// Owns the camera hardware and its input/output graph.
///
/// Lives on the session queue: every method runs there, so graph
/// mutations never interleave. All graph changes happen inside a
/// begin/commit transaction.
pub struct DeviceCaptureSession<H: CaptureHardware> {
    hardware: H,
    state: SessionState,
    device: Option<CaptureDevice>,
    preset: Option<ResolutionPreset>,
    outputs: Vec<OutputKind>,
    zoom_factor: f64,
    in_transaction: bool,
    status: Arc<Mutex<SessionStatus>>,
    diagnostics: Arc<Mutex<CaptureDiagnostics>>,
}

impl<H: CaptureHardware> DeviceCaptureSession<H> {
    pub fn new(
        hardware: H,
        status: Arc<Mutex<SessionStatus>>,
        diagnostics: Arc<Mutex<CaptureDiagnostics>>,
    ) -> Self {
        Self {
            hardware,
            state: SessionState::Unconfigured,
            device: None,
            preset: None,
            outputs: Vec::new(),
            zoom_factor: 1.0,
            in_transaction: false,
            status,
            diagnostics,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn active_device(&self) -> Option<&CaptureDevice> {
        self.device.as_ref()
    }

    pub fn preset(&self) -> Option<ResolutionPreset> {
        self.preset
    }

    pub fn outputs(&self) -> &[OutputKind] {
        &self.outputs
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    /// Authorize, select a camera, build the graph and start running.
    /// Transitions: unconfigured/stopped/failed → configuring → running.
    ///
    /// While already running the call is coalesced: nothing is touched and
    /// the active device is returned.
    pub fn setup(
        &mut self,
        authorization: &dyn AuthorizationProvider,
        plan: SessionPlan,
    ) -> Result<CaptureDevice, CaptureError> {
        if self.state.coalesces_setup() {
            if let Some(device) = &self.device {
                log::debug!("setup coalesced: session already {:?}", self.state);
                return Ok(device.clone());
            }
        }
        if self.state.is_configured() || self.state.is_failed() {
            self.dismantle();
        }

        self.set_state(SessionState::Configuring);
        match self.configure(authorization, plan) {
            Ok(device) => {
                self.hardware.start_running();
                self.set_state(SessionState::Running);
                log::info!("capture session running on {} ({:?})", device.name, self.preset);
                Ok(device)
            }
            Err(e) => {
                log::error!("capture session setup failed: {}", e);
                self.dismantle();
                self.set_state(SessionState::Failed(e.clone()));
                Err(e)
            }
        }
    }

    fn configure(
        &mut self,
        authorization: &dyn AuthorizationProvider,
        plan: SessionPlan,
    ) -> Result<CaptureDevice, CaptureError> {
        ensure_authorized(authorization)?;

        let device = select_device(self.hardware.available_devices(), plan.position)
            .ok_or(CaptureError::NoInputDevice)?;

        self.transaction(|session| -> Result<(), CaptureError> {
            session.hardware.configure_input(&device).map_err(|e| {
                log::error!("cannot add input {}: {}", device.name, e);
                CaptureError::NoInputDevice
            })?;
            session.device = Some(device.clone());
            session.negotiate_preset();
            for output in plan.outputs {
                session.attach_in_transaction(output)?;
            }
            Ok(())
        })?;

        self.zoom_factor = plan.zoom_factor;
        self.apply_capture_bias(&device);
        Ok(device)
    }

    /// Replace the active input with the camera at `position`.
    ///
    /// If the new input cannot be added, the previous one is restored in
    /// the same transaction and the call fails.
    pub fn switch_input(&mut self, position: DevicePosition) -> Result<CaptureDevice, CaptureError> {
        let current = match &self.device {
            Some(device) if self.state.is_configured() => device.clone(),
            _ => return Err(CaptureError::ConfigurationFailed("no configured session to switch".into())),
        };
        if current.position == position {
            return Ok(current);
        }
        let target = self
            .hardware
            .available_devices()
            .into_iter()
            .find(|d| d.position == position)
            .ok_or_else(|| CaptureError::ConfigurationFailed(format!("no {:?} camera available", position)))?;

        let result = self.transaction(|session| {
            session.hardware.remove_input(&current.id);
            match session.hardware.configure_input(&target) {
                Ok(()) => {
                    session.device = Some(target.clone());
                    session.negotiate_preset();
                    Ok(target.clone())
                }
                Err(e) => {
                    log::warn!("cannot switch to {}: {}; restoring {}", target.name, e, current.name);
                    if let Err(restore) = session.hardware.configure_input(&current) {
                        log::error!("failed to restore input {}: {}", current.name, restore);
                        session.device = None;
                    }
                    Err(CaptureError::ConfigurationFailed(format!(
                        "cannot add input {}: {}",
                        target.name, e
                    )))
                }
            }
        });

        match &result {
            Ok(device) => {
                log::info!("switched input to {}", device.name);
                self.apply_capture_bias(device);
                self.publish_status();
            }
            Err(_) if self.device.is_none() => {
                self.set_state(SessionState::Failed(CaptureError::NoInputDevice));
            }
            Err(_) => {}
        }
        result
    }

    /// Attach an output in its own transaction (last writer wins).
    pub fn attach_output(&mut self, output: OutputBinding) -> Result<(), CaptureError> {
        self.transaction(|session| session.attach_in_transaction(output))
    }

    pub fn detach_output(&mut self, kind: OutputKind) {
        if !self.outputs.contains(&kind) {
            return;
        }
        self.transaction(|session| {
            session.hardware.remove_output(kind);
            session.outputs.retain(|k| *k != kind);
        });
    }

    /// Idempotent. Transitions: stopped → running.
    pub fn start(&mut self) {
        match self.state {
            SessionState::Running => log::debug!("start ignored: already running"),
            SessionState::Stopped => {
                self.hardware.start_running();
                self.set_state(SessionState::Running);
            }
            ref other => log::warn!("start ignored in state {:?}", other),
        }
    }

    /// Idempotent. Transitions: running → stopped.
    pub fn stop(&mut self) {
        if self.state.is_running() {
            self.hardware.stop_running();
            self.set_state(SessionState::Stopped);
        }
    }

    /// Detach everything, stop, and return to `Unconfigured`.
    pub fn teardown(&mut self) {
        if self.state == SessionState::Unconfigured && self.device.is_none() && self.outputs.is_empty() {
            return;
        }
        self.dismantle();
        self.set_state(SessionState::Unconfigured);
        log::info!("capture session torn down");
    }

    fn dismantle(&mut self) {
        if self.state.is_running() {
            self.hardware.stop_running();
        }
        if self.device.is_none() && self.outputs.is_empty() {
            return;
        }
        self.transaction(|session| {
            for kind in std::mem::take(&mut session.outputs) {
                session.hardware.remove_output(kind);
            }
            if let Some(device) = session.device.take() {
                session.hardware.remove_input(&device.id);
            }
        });
        self.preset = None;
    }

    /// Apply a focus/zoom adjustment under the device lock.
    ///
    /// Lock failures are logged and the adjustment skipped; they never
    /// affect the session state.
    pub fn adjust_device(&mut self, adjustment: DeviceAdjustment) -> Result<(), CaptureError> {
        let device = self.device.as_ref().ok_or(CaptureError::NoInputDevice)?;
        if !adjustment.is_finite() {
            log::warn!("ignoring {:?}: non-finite value", adjustment);
            return Err(CaptureError::ConfigurationFailed(format!("{:?} is not finite", adjustment)));
        }
        let adjustment = match adjustment {
            DeviceAdjustment::Zoom(factor) => DeviceAdjustment::Zoom(device.clamp_zoom(factor)),
            DeviceAdjustment::FocusAt { x, y } => DeviceAdjustment::FocusAt {
                x: x.clamp(0.0, 1.0),
                y: y.clamp(0.0, 1.0),
            },
            other => other,
        };
        self.hardware.lock_for_device_adjustment(adjustment).map_err(|e| {
            let err = CaptureError::DeviceLocked(e.to_string());
            log::warn!("skipping {:?}: {}", adjustment, err);
            err
        })
    }

    /// Whether a still capture can be triggered right now.
    pub fn has_video_connection(&self) -> bool {
        self.state.is_running()
            && self.outputs.contains(&OutputKind::StillImage)
            && self.hardware.has_video_connection()
    }

    /// Fresh settings for the active device.
    pub fn capture_settings(&self, flash_requested: bool, orientation: VideoOrientation) -> Option<CaptureSettings> {
        let device = self.device.as_ref()?;
        let preset = self.preset.unwrap_or(ResolutionPreset::Hd1920x1080);
        Some(CaptureSettings::for_device(device, preset, flash_requested, orientation))
    }

    pub fn capture_photo(&mut self, settings: &CaptureSettings, completion: PhotoCallback) {
        self.hardware.capture_photo(settings, completion);
    }

    // --- Internal helpers ---

    fn transaction<R>(&mut self, body: impl FnOnce(&mut Self) -> R) -> R {
        if self.in_transaction {
            // Nested brackets would commit the outer transaction early.
            log::error!("nested configuration transaction");
            return body(self);
        }
        self.in_transaction = true;
        self.hardware.begin_configuration();
        let result = body(self);
        self.hardware.commit_configuration();
        self.in_transaction = false;
        self.diagnostics.lock().configuration_transactions += 1;
        result
    }

    fn attach_in_transaction(&mut self, output: OutputBinding) -> Result<(), CaptureError> {
        let kind = output.kind();
        if !self.hardware.can_add_output(kind) || self.outputs.contains(&kind) {
            let conflicting: Vec<OutputKind> =
                self.outputs.iter().copied().filter(|k| kind.conflicts_with(*k)).collect();
            for existing in conflicting {
                log::debug!("removing {:?} output to make room for {:?}", existing, kind);
                self.hardware.remove_output(existing);
                self.outputs.retain(|k| *k != existing);
            }
            if !self.hardware.can_add_output(kind) {
                return Err(CaptureError::ConfigurationFailed(format!("cannot attach {:?} output", kind)));
            }
        }
        self.hardware
            .attach_output(output)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("cannot attach {:?} output: {}", kind, e)))?;
        self.outputs.push(kind);
        Ok(())
    }

    fn negotiate_preset(&mut self) {
        let Some(device) = &self.device else {
            return;
        };
        let chosen = ResolutionPreset::BY_PREFERENCE
            .into_iter()
            .find(|p| device.supports_preset(*p) && self.hardware.supports_preset(*p));
        match chosen {
            Some(preset) => {
                self.hardware.apply_preset(preset);
                self.preset = Some(preset);
            }
            None => {
                log::warn!("{} supports no known preset; keeping hardware default", device.name);
                self.preset = None;
            }
        }
    }

    /// Zoom and near-focus bias that helps text recognition on documents.
    fn apply_capture_bias(&mut self, device: &CaptureDevice) {
        let zoom = device.clamp_zoom(self.zoom_factor);
        if zoom > 1.0 {
            let _ = self.adjust_device(DeviceAdjustment::Zoom(zoom));
        }
        if device.supports_near_focus {
            let _ = self.adjust_device(DeviceAdjustment::NearFocus);
        }
    }

    fn set_state(&mut self, state: SessionState) {
        log::debug!("session state: {:?} -> {:?}", self.state, state);
        self.state = state;
        self.publish_status();
    }

    fn publish_status(&self) {
        let mut status = self.status.lock();
        status.state = self.state.clone();
        status.device = self.device.clone();
    }
}

fn ensure_authorized(authorization: &dyn AuthorizationProvider) -> Result<(), CaptureError> {
    match authorization.status() {
        AuthorizationStatus::Authorized => Ok(()),
        AuthorizationStatus::NotDetermined => {
            if authorization.request_access() {
                Ok(())
            } else {
                Err(CaptureError::NotAuthorizedToUseDevice)
            }
        }
        AuthorizationStatus::Denied | AuthorizationStatus::Restricted => {
            Err(CaptureError::NotAuthorizedToUseDevice)
        }
    }
}

/// The camera at `position`, or any camera if none faces that way.
fn select_device(devices: Vec<CaptureDevice>, position: DevicePosition) -> Option<CaptureDevice> {
    let mut fallback = None;
    for device in devices {
        if device.position == position {
            return Some(device);
        }
        fallback.get_or_insert(device);
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::error::HardwareError;
    use std::collections::HashSet;

    /// Minimal graph that records what the session does to it.
    #[derive(Default)]
    struct FakeHardware {
        devices: Vec<CaptureDevice>,
        rejected_inputs: HashSet<String>,
        refused_outputs: HashSet<OutputKind>,
        lock_fails: bool,
        inputs: Vec<String>,
        outputs: Vec<OutputKind>,
        open: bool,
        running: bool,
        preset: Option<ResolutionPreset>,
        adjustments: Vec<DeviceAdjustment>,
        log: Vec<String>,
    }

    impl CaptureHardware for FakeHardware {
        fn available_devices(&self) -> Vec<CaptureDevice> {
            self.devices.clone()
        }
        fn begin_configuration(&mut self) {
            assert!(!self.open, "overlapping transaction");
            self.open = true;
        }
        fn commit_configuration(&mut self) {
            assert!(self.open);
            self.open = false;
        }
        fn configure_input(&mut self, device: &CaptureDevice) -> Result<(), HardwareError> {
            assert!(self.open);
            if self.rejected_inputs.contains(&device.id) {
                return Err(HardwareError::InputRejected(device.id.clone()));
            }
            self.inputs.push(device.id.clone());
            Ok(())
        }
        fn remove_input(&mut self, device_id: &str) {
            self.inputs.retain(|id| id != device_id);
        }
        fn can_add_output(&self, kind: OutputKind) -> bool {
            !self.refused_outputs.contains(&kind) && !self.outputs.contains(&kind)
        }
        fn attach_output(&mut self, output: OutputBinding) -> Result<(), HardwareError> {
            assert!(self.open);
            self.outputs.push(output.kind());
            Ok(())
        }
        fn remove_output(&mut self, kind: OutputKind) {
            self.log.push(format!("remove {:?}", kind));
            self.outputs.retain(|k| *k != kind);
        }
        fn supports_preset(&self, preset: ResolutionPreset) -> bool {
            preset != ResolutionPreset::Photo
        }
        fn apply_preset(&mut self, preset: ResolutionPreset) {
            self.preset = Some(preset);
        }
        fn lock_for_device_adjustment(&mut self, adjustment: DeviceAdjustment) -> Result<(), HardwareError> {
            if self.lock_fails {
                return Err(HardwareError::LockFailed("busy".into()));
            }
            self.adjustments.push(adjustment);
            Ok(())
        }
        fn start_running(&mut self) {
            self.running = true;
        }
        fn stop_running(&mut self) {
            self.running = false;
        }
        fn has_video_connection(&self) -> bool {
            self.running && !self.inputs.is_empty()
        }
        fn capture_photo(&mut self, _settings: &CaptureSettings, _completion: PhotoCallback) {}
    }

    struct Auth(AuthorizationStatus, bool);

    impl AuthorizationProvider for Auth {
        fn status(&self) -> AuthorizationStatus {
            self.0
        }
        fn request_access(&self) -> bool {
            self.1
        }
    }

    const GRANTED: Auth = Auth(AuthorizationStatus::Authorized, true);

    fn camera(id: &str, position: DevicePosition) -> CaptureDevice {
        CaptureDevice {
            id: id.into(),
            name: id.into(),
            position,
            has_flash: position == DevicePosition::Back,
            max_zoom_factor: 5.0,
            supports_near_focus: true,
            supported_presets: ResolutionPreset::BY_PREFERENCE.to_vec(),
        }
    }

    fn session_with(hardware: FakeHardware) -> DeviceCaptureSession<FakeHardware> {
        DeviceCaptureSession::new(
            hardware,
            Arc::new(Mutex::new(SessionStatus::default())),
            Arc::new(Mutex::new(CaptureDiagnostics::default())),
        )
    }

    fn phone() -> FakeHardware {
        FakeHardware {
            devices: vec![camera("back", DevicePosition::Back), camera("front", DevicePosition::Front)],
            ..Default::default()
        }
    }

    fn plan() -> SessionPlan {
        SessionPlan {
            position: DevicePosition::Back,
            zoom_factor: 2.0,
            outputs: vec![OutputBinding::StillImage],
        }
    }

    #[test]
    fn setup_builds_graph_and_runs() {
        let mut session = session_with(phone());
        let device = session.setup(&GRANTED, plan()).unwrap();

        assert_eq!(device.id, "back");
        assert!(session.state().is_running());
        assert_eq!(session.hardware().inputs, vec!["back"]);
        assert_eq!(session.outputs(), [OutputKind::StillImage]);
        // Photo is unsupported by the fake graph, so the next best wins.
        assert_eq!(session.preset(), Some(ResolutionPreset::Uhd3840x2160));
        assert_eq!(
            session.hardware().adjustments,
            vec![DeviceAdjustment::Zoom(2.0), DeviceAdjustment::NearFocus]
        );
        assert!(session.has_video_connection());
    }

    #[test]
    fn setup_requests_undetermined_permission() {
        let mut session = session_with(phone());
        assert!(session.setup(&Auth(AuthorizationStatus::NotDetermined, true), plan()).is_ok());

        let mut session = session_with(phone());
        let err = session
            .setup(&Auth(AuthorizationStatus::NotDetermined, false), plan())
            .unwrap_err();
        assert_eq!(err, CaptureError::NotAuthorizedToUseDevice);
        assert!(session.state().is_failed());
        assert!(session.hardware().inputs.is_empty());
    }

    #[test]
    fn setup_without_cameras_fails() {
        let mut session = session_with(FakeHardware::default());
        assert_eq!(session.setup(&GRANTED, plan()).unwrap_err(), CaptureError::NoInputDevice);
        assert_eq!(*session.state(), SessionState::Failed(CaptureError::NoInputDevice));
    }

    #[test]
    fn second_setup_is_coalesced() {
        let mut session = session_with(phone());
        session.setup(&GRANTED, plan()).unwrap();
        let transactions = session.diagnostics.lock().configuration_transactions;

        let device = session.setup(&GRANTED, plan()).unwrap();
        assert_eq!(device.id, "back");
        assert_eq!(session.diagnostics.lock().configuration_transactions, transactions);
        assert_eq!(session.hardware().inputs.len(), 1);
    }

    #[test]
    fn switch_restores_previous_input_on_failure() {
        let mut hardware = phone();
        hardware.rejected_inputs.insert("front".into());
        let mut session = session_with(hardware);
        session.setup(&GRANTED, plan()).unwrap();

        let err = session.switch_input(DevicePosition::Front).unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));
        assert_eq!(session.hardware().inputs, vec!["back"]);
        assert_eq!(session.active_device().unwrap().id, "back");
        assert!(session.state().is_running());
    }

    #[test]
    fn switch_replaces_input() {
        let mut session = session_with(phone());
        session.setup(&GRANTED, plan()).unwrap();

        let device = session.switch_input(DevicePosition::Front).unwrap();
        assert_eq!(device.id, "front");
        assert_eq!(session.hardware().inputs, vec!["front"]);
        assert!(session.capture_settings(true, VideoOrientation::Portrait).is_some());
    }

    #[test]
    fn reattaching_output_replaces_existing() {
        let mut session = session_with(phone());
        session.setup(&GRANTED, plan()).unwrap();

        session.attach_output(OutputBinding::StillImage).unwrap();
        assert_eq!(session.outputs(), [OutputKind::StillImage]);
        assert_eq!(session.hardware().log, vec!["remove StillImage"]);
    }

    #[test]
    fn refused_output_fails_setup_and_clears_graph() {
        let mut hardware = phone();
        hardware.refused_outputs.insert(OutputKind::Metadata);
        let mut session = session_with(hardware);

        let mut plan = plan();
        plan.outputs.push(OutputBinding::Metadata(Arc::new(|_: Vec<String>| {})));
        let err = session.setup(&GRANTED, plan).unwrap_err();

        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));
        assert!(session.hardware().inputs.is_empty());
        assert!(session.hardware().outputs.is_empty());
    }

    #[test]
    fn lock_failure_is_not_fatal() {
        let mut hardware = phone();
        hardware.lock_fails = true;
        let mut session = session_with(hardware);
        session.setup(&GRANTED, plan()).unwrap();

        let err = session.adjust_device(DeviceAdjustment::FocusAt { x: 0.5, y: 0.5 }).unwrap_err();
        assert!(matches!(err, CaptureError::DeviceLocked(_)));
        assert!(session.state().is_running());
    }

    #[test]
    fn non_finite_adjustments_are_rejected() {
        let mut session = session_with(phone());
        session.setup(&GRANTED, plan()).unwrap();
        let applied = session.hardware().adjustments.len();

        assert!(session.adjust_device(DeviceAdjustment::Zoom(f64::NAN)).is_err());
        assert!(session
            .adjust_device(DeviceAdjustment::FocusAt { x: f64::INFINITY, y: 0.5 })
            .is_err());
        assert_eq!(session.hardware().adjustments.len(), applied);
        assert!(session.state().is_running());
    }

    #[test]
    fn switch_without_target_camera_keeps_session() {
        let mut session = session_with(FakeHardware {
            devices: vec![camera("back", DevicePosition::Back)],
            ..Default::default()
        });
        let err = session.switch_input(DevicePosition::Front).unwrap_err();
        assert!(!err.is_fatal(), "unconfigured: {}", err);

        session.setup(&GRANTED, plan()).unwrap();
        let err = session.switch_input(DevicePosition::Front).unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));
        assert!(!err.is_fatal());
        assert_eq!(session.hardware().inputs, vec!["back"]);
        assert!(session.state().is_running());
    }

    #[test]
    fn start_stop_are_idempotent() {
        let mut session = session_with(phone());
        session.start(); // unconfigured: ignored
        assert_eq!(*session.state(), SessionState::Unconfigured);

        session.setup(&GRANTED, plan()).unwrap();
        session.stop();
        session.stop();
        assert_eq!(*session.state(), SessionState::Stopped);
        assert!(!session.has_video_connection());

        session.start();
        session.start();
        assert!(session.state().is_running());
    }

    #[test]
    fn teardown_clears_graph() {
        let mut session = session_with(phone());
        session.setup(&GRANTED, plan()).unwrap();
        session.teardown();

        assert_eq!(*session.state(), SessionState::Unconfigured);
        assert!(session.hardware().inputs.is_empty());
        assert!(session.hardware().outputs.is_empty());
        assert!(!session.hardware().running);
        assert!(session.status.lock().device.is_none());
    }
}
