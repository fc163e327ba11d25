use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;

use crate::models::capture_models::{CaptureDiagnostics, VideoFrame};
use crate::models::error::CaptureError;

/// State owned by the frame queue's worker thread.
pub trait FrameConsumer: Send + 'static {
    type Control: Send + 'static;

    fn on_frame(&mut self, frame: VideoFrame);

    fn on_control(&mut self, control: Self::Control);
}

/// Producer side of the frame queue, handed to the hardware callback.
///
/// `offer` never blocks: while the worker is busy and one frame is already
/// waiting, further frames are discarded.
#[derive(Clone)]
pub struct FrameSink {
    frames: Sender<VideoFrame>,
    diagnostics: Arc<Mutex<CaptureDiagnostics>>,
}

impl FrameSink {
    /// Returns false if the frame was dropped.
    pub fn offer(&self, frame: VideoFrame) -> bool {
        let result = self.frames.try_send(frame);
        let mut d = self.diagnostics.lock();
        d.frames_received += 1;
        match result {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                d.frames_dropped += 1;
                false
            }
        }
    }
}

/// Execution context for streamed video frames.
///
/// Independent of the session queue: a slow consumer only causes frames to
/// be dropped here, it never delays session work. Control messages take
/// priority over pending frames.
pub struct FrameQueue<C: FrameConsumer> {
    frames: Option<Sender<VideoFrame>>,
    control: Option<Sender<C::Control>>,
    diagnostics: Arc<Mutex<CaptureDiagnostics>>,
    handle: Option<JoinHandle<()>>,
}

impl<C: FrameConsumer> FrameQueue<C> {
    pub fn spawn(
        label: &str,
        consumer: C,
        diagnostics: Arc<Mutex<CaptureDiagnostics>>,
    ) -> Result<Self, CaptureError> {
        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<VideoFrame>(1);
        let (control_tx, control_rx) = crossbeam_channel::unbounded::<C::Control>();

        let worker_diagnostics = Arc::clone(&diagnostics);
        let handle = thread::Builder::new()
            .name(label.into())
            .spawn(move || {
                let mut consumer = consumer;
                // A control message invalidates frames captured before it.
                let apply = |consumer: &mut C, control: C::Control| {
                    let stale = frame_rx.try_iter().count();
                    if stale > 0 {
                        log::debug!("discarding {} frame(s) queued before control", stale);
                        worker_diagnostics.lock().frames_dropped += stale as u64;
                    }
                    consumer.on_control(control);
                };
                loop {
                    match control_rx.try_recv() {
                        Ok(control) => {
                            apply(&mut consumer, control);
                            continue;
                        }
                        Err(TryRecvError::Disconnected) => break,
                        Err(TryRecvError::Empty) => {}
                    }

                    crossbeam_channel::select! {
                        recv(control_rx) -> msg => match msg {
                            Ok(control) => apply(&mut consumer, control),
                            Err(_) => break,
                        },
                        recv(frame_rx) -> msg => match msg {
                            Ok(frame) => consumer.on_frame(frame),
                            Err(_) => break,
                        },
                    }
                }
            })
            .map_err(|e| CaptureError::ConfigurationFailed(format!("failed to spawn {}: {}", label, e)))?;

        Ok(Self {
            frames: Some(frame_tx),
            control: Some(control_tx),
            diagnostics,
            handle: Some(handle),
        })
    }

    /// A producer handle for the video-frame output callback.
    pub fn sink(&self) -> Option<FrameSink> {
        self.frames.as_ref().map(|frames| FrameSink {
            frames: frames.clone(),
            diagnostics: Arc::clone(&self.diagnostics),
        })
    }

    /// Send a control message. Control messages are never dropped.
    pub fn control(&self, control: C::Control) -> bool {
        match &self.control {
            Some(sender) => sender.send(control).is_ok(),
            None => false,
        }
    }

    /// A control sender that can be moved into jobs on other queues, so
    /// control messages stay ordered with the work that triggers them.
    pub fn controls(&self) -> Option<Sender<C::Control>> {
        self.control.clone()
    }
}

impl<C: FrameConsumer> Drop for FrameQueue<C> {
    fn drop(&mut self) {
        self.control.take();
        self.frames.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    enum Control {
        Flush(Sender<Vec<u64>>),
    }

    /// Records sequences; blocks on the first frame until released.
    struct Recorder {
        seen: Vec<u64>,
        gate: Option<crossbeam_channel::Receiver<()>>,
    }

    impl FrameConsumer for Recorder {
        type Control = Control;

        fn on_frame(&mut self, frame: VideoFrame) {
            if let Some(gate) = self.gate.take() {
                let _ = gate.recv();
            }
            self.seen.push(frame.sequence);
        }

        fn on_control(&mut self, control: Control) {
            match control {
                Control::Flush(reply) => {
                    let _ = reply.send(self.seen.clone());
                }
            }
        }
    }

    fn frame(sequence: u64) -> VideoFrame {
        VideoFrame::new(sequence, 1, 1, crate::models::capture_models::PixelFormat::Luma8, vec![0])
    }

    #[test]
    fn late_frames_are_dropped_while_busy() {
        let (gate_tx, gate_rx) = crossbeam_channel::bounded(0);
        let diagnostics = Arc::new(Mutex::new(CaptureDiagnostics::default()));
        let queue = FrameQueue::spawn(
            "test-frames",
            Recorder {
                seen: Vec::new(),
                gate: Some(gate_rx),
            },
            Arc::clone(&diagnostics),
        )
        .unwrap();
        let sink = queue.sink().unwrap();

        assert!(sink.offer(frame(1)));
        // Wait until the worker has taken frame 1 and is parked on the gate.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while sink.frames.len() > 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }

        assert!(sink.offer(frame(2))); // fills the single slot
        assert!(!sink.offer(frame(3))); // late
        assert!(!sink.offer(frame(4))); // late
        gate_tx.send(()).unwrap();

        // Control jumps ahead of pending frames; let frame 2 run first.
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        std::thread::sleep(Duration::from_millis(20));
        queue.control(Control::Flush(reply_tx));
        let seen = reply_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        assert_eq!(seen, vec![1, 2]);
        let d = diagnostics.lock();
        assert_eq!(d.frames_received, 4);
        assert_eq!(d.frames_dropped, 2);
    }

    #[test]
    fn control_discards_frames_queued_before_it() {
        let (gate_tx, gate_rx) = crossbeam_channel::bounded(0);
        let diagnostics = Arc::new(Mutex::new(CaptureDiagnostics::default()));
        let queue = FrameQueue::spawn(
            "test-frames",
            Recorder {
                seen: Vec::new(),
                gate: Some(gate_rx),
            },
            Arc::clone(&diagnostics),
        )
        .unwrap();
        let sink = queue.sink().unwrap();

        assert!(sink.offer(frame(1)));
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while sink.frames.len() > 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(sink.offer(frame(2))); // waits behind frame 1

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        queue.control(Control::Flush(reply_tx));
        gate_tx.send(()).unwrap();
        assert_eq!(reply_rx.recv_timeout(Duration::from_secs(2)).unwrap(), vec![1]);

        assert!(sink.offer(frame(3)));
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        std::thread::sleep(Duration::from_millis(20));
        queue.control(Control::Flush(reply_tx));
        assert_eq!(reply_rx.recv_timeout(Duration::from_secs(2)).unwrap(), vec![1, 3]);
        assert_eq!(diagnostics.lock().frames_dropped, 1);
    }
}
