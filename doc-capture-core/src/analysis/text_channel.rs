use std::sync::Arc;

use parking_lot::Mutex;

use super::iban::{self, IbanCandidateSet};
use crate::models::capture_models::{CaptureDiagnostics, VideoFrame};
use crate::models::events::{CaptureEvent, IbanSnapshot};
use crate::queue::delivery::DeliveryTicket;
use crate::queue::frame_queue::FrameConsumer;
use crate::traits::text_recognizer::{RecognitionRequest, RecognizedLine, TextRecognizer};

/// Control messages for the text channel, sent through the frame queue.
pub enum TextChannelControl {
    /// Start a detection session with an empty candidate set.
    Begin {
        ticket: DeliveryTicket,
        request: RecognitionRequest,
    },
    /// Clear the candidate set; publish an empty snapshot if it had entries.
    Reset,
    /// Clear and stop recognizing until the next `Begin`.
    End,
}

struct DetectionSession {
    ticket: DeliveryTicket,
    request: RecognitionRequest,
}

/// Extracts IBAN candidates from streamed frames.
///
/// Lives on the frame queue, which exclusively owns the recognizer and the
/// candidate set. Observers only ever see `IbanSnapshot` copies.
pub struct TextRecognitionSideChannel<R: TextRecognizer> {
    recognizer: R,
    candidates: IbanCandidateSet,
    session: Option<DetectionSession>,
    diagnostics: Arc<Mutex<CaptureDiagnostics>>,
}

impl<R: TextRecognizer> TextRecognitionSideChannel<R> {
    pub fn new(recognizer: R, diagnostics: Arc<Mutex<CaptureDiagnostics>>) -> Self {
        Self {
            recognizer,
            candidates: IbanCandidateSet::new(),
            session: None,
            diagnostics,
        }
    }

    pub fn candidates(&self) -> &IbanCandidateSet {
        &self.candidates
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Recognize one frame and fold its IBANs into the set.
    ///
    /// Returns the published snapshot, if any. Recognition errors are
    /// logged and swallowed; the next frame simply tries again.
    pub fn process_frame(&mut self, frame: &VideoFrame) -> Option<IbanSnapshot> {
        let session = self.session.as_ref()?;

        let lines = match self.recognizer.recognize(frame, &session.request) {
            Ok(lines) => lines,
            Err(e) => {
                log::warn!("frame {}: {}", frame.sequence, e);
                self.diagnostics.lock().recognition_failures += 1;
                return None;
            }
        };
        self.diagnostics.lock().frames_recognized += 1;

        for found in scan_lines(&lines) {
            if self.candidates.insert(&found) {
                log::debug!("frame {}: new IBAN candidate", frame.sequence);
            }
        }

        if self.candidates.is_empty() {
            return None;
        }
        let snapshot = self.candidates.snapshot();
        session.ticket.deliver(CaptureEvent::IbanCandidates(snapshot.clone()));
        Some(snapshot)
    }

    fn reset(&mut self) {
        if self.candidates.is_empty() {
            return;
        }
        self.candidates.clear();
        if let Some(session) = &self.session {
            session.ticket.deliver(CaptureEvent::IbanCandidates(IbanSnapshot::default()));
        }
    }
}

impl<R: TextRecognizer + 'static> FrameConsumer for TextRecognitionSideChannel<R> {
    type Control = TextChannelControl;

    fn on_frame(&mut self, frame: VideoFrame) {
        self.process_frame(&frame);
    }

    fn on_control(&mut self, control: TextChannelControl) {
        match control {
            TextChannelControl::Begin { ticket, request } => {
                self.candidates.clear();
                self.session = Some(DetectionSession { ticket, request });
            }
            TextChannelControl::Reset => self.reset(),
            TextChannelControl::End => {
                self.reset();
                self.session = None;
            }
        }
    }
}

/// All IBANs in a frame's recognized lines.
///
/// Only each line's top candidate is scanned, individually and joined with
/// the rest of the frame so IBANs split across lines are still found.
pub fn scan_lines(lines: &[RecognizedLine]) -> Vec<String> {
    let top: Vec<&str> = lines.iter().filter_map(RecognizedLine::top_candidate).collect();

    let mut found: Vec<String> = top.iter().flat_map(|text| iban::extract_ibans(text)).collect();
    if top.len() > 1 {
        found.extend(iban::extract_ibans(&top.join(" ")));
    }
    found
}
