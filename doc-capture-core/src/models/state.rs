use super::error::CaptureError;

/// Device session state machine.
///
/// State transitions:
/// ```text
/// unconfigured → configuring → running ↔ stopped
///                     ↓
///                   failed → configuring (re-setup)
/// ```
/// Teardown returns any state to `Unconfigured`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unconfigured,
    Configuring,
    Running,
    Stopped,
    Failed(CaptureError),
}

impl SessionState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// A graph exists (inputs and outputs attached), running or not.
    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Running | Self::Stopped)
    }

    /// Whether a `setup()` arriving in this state is coalesced instead of
    /// reconfiguring the hardware.
    pub fn coalesces_setup(&self) -> bool {
        matches!(self, Self::Configuring | Self::Running)
    }
}
