//! Scripted camera permission.
//!
//! Models the platform flow: a status that starts out undetermined and a
//! consent prompt that resolves to the scripted answer. The status can be
//! changed at any time to simulate the user flipping the privacy toggle.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use doc_capture_core::traits::authorization::{AuthorizationProvider, AuthorizationStatus};

pub struct ScriptedAuthorization {
    status: Mutex<AuthorizationStatus>,
    grant_on_request: bool,
    requests: AtomicUsize,
}

impl ScriptedAuthorization {
    pub fn authorized() -> Self {
        Self::with_status(AuthorizationStatus::Authorized, true)
    }

    pub fn denied() -> Self {
        Self::with_status(AuthorizationStatus::Denied, false)
    }

    /// Undetermined; the prompt answers `grant`.
    pub fn prompt(grant: bool) -> Self {
        Self::with_status(AuthorizationStatus::NotDetermined, grant)
    }

    pub fn with_status(status: AuthorizationStatus, grant_on_request: bool) -> Self {
        Self {
            status: Mutex::new(status),
            grant_on_request,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn set_status(&self, status: AuthorizationStatus) {
        *self.status.lock() = status;
    }

    /// How many consent prompts were shown.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl AuthorizationProvider for ScriptedAuthorization {
    fn status(&self) -> AuthorizationStatus {
        *self.status.lock()
    }

    fn request_access(&self) -> bool {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut status = self.status.lock();
        if *status != AuthorizationStatus::NotDetermined {
            return *status == AuthorizationStatus::Authorized;
        }
        *status = if self.grant_on_request {
            AuthorizationStatus::Authorized
        } else {
            AuthorizationStatus::Denied
        };
        log::info!("camera permission prompt answered: {:?}", *status);
        self.grant_on_request
    }
}
