//! Scripted text recognizer.
//!
//! Stands in for a platform OCR engine: results are looked up by frame
//! sequence number, so tests control exactly what each frame "contains".

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use doc_capture_core::models::capture_models::VideoFrame;
use doc_capture_core::models::error::RecognitionError;
use doc_capture_core::traits::text_recognizer::{RecognitionRequest, RecognizedLine, TextRecognizer};

#[derive(Default)]
struct Script {
    frames: HashMap<u64, Result<Vec<RecognizedLine>, RecognitionError>>,
    fallback: Vec<RecognizedLine>,
    delay: Option<Duration>,
    recognized: Vec<u64>,
    requests: Vec<RecognitionRequest>,
}

/// Recognizer whose output is scripted per frame sequence number.
///
/// Clones share the script, so a test can keep one handle while the
/// controller owns another.
#[derive(Clone, Default)]
pub struct ScriptedRecognizer {
    script: Arc<Mutex<Script>>,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame `sequence` reads as `lines`, one entry per text line.
    pub fn on_frame(&self, sequence: u64, lines: &[&str]) -> &Self {
        let lines = lines.iter().map(|l| RecognizedLine::new(*l)).collect();
        self.script.lock().frames.insert(sequence, Ok(lines));
        self
    }

    /// Recognition of frame `sequence` fails.
    pub fn fail_on_frame(&self, sequence: u64, reason: &str) -> &Self {
        self.script
            .lock()
            .frames
            .insert(sequence, Err(RecognitionError(reason.into())));
        self
    }

    /// Lines returned for frames without a script entry.
    pub fn otherwise(&self, lines: &[&str]) -> &Self {
        self.script.lock().fallback = lines.iter().map(|l| RecognizedLine::new(*l)).collect();
        self
    }

    /// Simulate a slow engine.
    pub fn with_delay(&self, delay: Duration) -> &Self {
        self.script.lock().delay = Some(delay);
        self
    }

    /// Sequence numbers of frames that reached the recognizer, in order.
    pub fn recognized_frames(&self) -> Vec<u64> {
        self.script.lock().recognized.clone()
    }

    pub fn last_request(&self) -> Option<RecognitionRequest> {
        self.script.lock().requests.last().cloned()
    }
}

impl TextRecognizer for ScriptedRecognizer {
    fn recognize(
        &mut self,
        frame: &VideoFrame,
        request: &RecognitionRequest,
    ) -> Result<Vec<RecognizedLine>, RecognitionError> {
        let (result, delay) = {
            let mut script = self.script.lock();
            script.recognized.push(frame.sequence);
            script.requests.push(request.clone());
            let result = match script.frames.get(&frame.sequence) {
                Some(result) => result.clone(),
                None => Ok(script.fallback.clone()),
            };
            (result, script.delay)
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        result.map(|lines| {
            lines
                .into_iter()
                .map(|mut line| {
                    line.candidates.truncate(request.max_candidates);
                    line
                })
                .collect()
        })
    }
}
