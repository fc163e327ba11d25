use crate::models::capture_models::VideoOrientation;

/// Reports the UI's current interface orientation.
pub trait OrientationSource: Send + Sync {
    fn current_orientation(&self) -> VideoOrientation;
}

/// Orientation source for fixed-orientation UIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedOrientation(pub VideoOrientation);

impl OrientationSource for FixedOrientation {
    fn current_orientation(&self) -> VideoOrientation {
        self.0
    }
}
