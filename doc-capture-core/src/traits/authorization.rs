/// Camera permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationStatus {
    NotDetermined,
    Authorized,
    Denied,
    Restricted,
}

/// Source of camera permission.
pub trait AuthorizationProvider: Send + Sync {
    fn status(&self) -> AuthorizationStatus;

    /// Prompt the user. Blocks until they answer; only ever called from the
    /// session queue, never from the UI thread.
    fn request_access(&self) -> bool;
}
