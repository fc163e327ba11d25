use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::Sender;

use crate::models::error::CaptureError;

type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// FIFO execution context that exclusively owns a piece of state.
///
/// Jobs run one at a time, in submission order, on a dedicated thread that
/// owns `S`. Nothing outside the queue can reach the state, so the queue
/// is the only lock discipline the state needs.
pub struct SerialQueue<S: Send + 'static> {
    label: String,
    sender: Option<Sender<Job<S>>>,
    handle: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl<S: Send + 'static> SerialQueue<S> {
    pub fn spawn(label: &str, state: S) -> Result<Self, CaptureError> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job<S>>();

        let handle = thread::Builder::new()
            .name(label.into())
            .spawn(move || {
                let mut state = state;
                for job in receiver.iter() {
                    job(&mut state);
                }
            })
            .map_err(|e| CaptureError::ConfigurationFailed(format!("failed to spawn {}: {}", label, e)))?;

        let thread_id = handle.thread().id();
        Ok(Self {
            label: label.into(),
            sender: Some(sender),
            handle: Some(handle),
            thread_id,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the caller is running on this queue.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Enqueue `job`. Never blocks. Returns false if the queue has shut down.
    pub fn submit(&self, job: impl FnOnce(&mut S) + Send + 'static) -> bool {
        match &self.sender {
            Some(sender) => sender.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Run `job` after everything already queued and wait for its result.
    ///
    /// Returns `None` when called from the queue itself (it would wait on
    /// its own thread) or after shutdown.
    pub fn sync<R: Send + 'static>(&self, job: impl FnOnce(&mut S) -> R + Send + 'static) -> Option<R> {
        if self.is_current() {
            log::error!("{}: sync() called from its own queue", self.label);
            return None;
        }
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        if !self.submit(move |state| {
            let _ = reply_tx.send(job(state));
        }) {
            return None;
        }
        reply_rx.recv().ok()
    }
}

impl<S: Send + 'static> Drop for SerialQueue<S> {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish queued jobs and exit.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if !self.is_current() {
                let _ = handle.join();
            }
        }
    }
}
