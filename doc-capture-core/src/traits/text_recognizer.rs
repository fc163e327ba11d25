use crate::models::capture_models::VideoFrame;
use crate::models::error::RecognitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecognitionLevel {
    Fast,
    Accurate,
}

/// Parameters for one recognition pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionRequest {
    pub level: RecognitionLevel,
    /// IBANs are codes, not words; dictionary correction only corrupts them.
    pub uses_language_correction: bool,
    /// Candidates to produce per line, best first.
    pub max_candidates: usize,
}

impl RecognitionRequest {
    pub fn for_account_numbers(max_candidates: usize) -> Self {
        Self {
            level: RecognitionLevel::Accurate,
            uses_language_correction: false,
            max_candidates,
        }
    }
}

/// One recognized line of text with its ranked candidate strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecognizedLine {
    pub candidates: Vec<String>,
}

impl RecognizedLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![text.into()],
        }
    }

    pub fn top_candidate(&self) -> Option<&str> {
        self.candidates.first().map(String::as_str)
    }
}

/// On-device text recognition engine.
///
/// Owned by the frame queue; called once per delivered frame.
pub trait TextRecognizer: Send {
    fn recognize(
        &mut self,
        frame: &VideoFrame,
        request: &RecognitionRequest,
    ) -> Result<Vec<RecognizedLine>, RecognitionError>;
}
