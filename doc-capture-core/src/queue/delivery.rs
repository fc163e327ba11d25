use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::models::events::CaptureEvent;

/// Producer side of the UI event channel.
///
/// Every event is stamped with the delivery epoch current when its producer
/// was set up. `advance_epoch` (teardown) makes all older producers stale:
/// their events are dropped on send, and anything already buffered is
/// dropped on receive.
#[derive(Clone)]
pub struct EventDelivery {
    sender: Sender<(u64, CaptureEvent)>,
    epoch: Arc<AtomicU64>,
}

impl EventDelivery {
    pub fn channel() -> (Self, EventStream) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let epoch = Arc::new(AtomicU64::new(0));
        (
            Self {
                sender,
                epoch: Arc::clone(&epoch),
            },
            EventStream { receiver, epoch },
        )
    }

    /// A ticket bound to the current epoch.
    pub fn ticket(&self) -> DeliveryTicket {
        DeliveryTicket {
            epoch: self.epoch.load(Ordering::SeqCst),
            sender: self.sender.clone(),
            current: Arc::clone(&self.epoch),
        }
    }

    /// Invalidate every outstanding ticket.
    pub fn advance_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

/// Permission to deliver events for one session.
#[derive(Clone)]
pub struct DeliveryTicket {
    epoch: u64,
    sender: Sender<(u64, CaptureEvent)>,
    current: Arc<AtomicU64>,
}

impl DeliveryTicket {
    pub fn is_live(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.epoch
    }

    /// Post `event` to the UI. Never blocks; a no-op for stale tickets.
    pub fn deliver(&self, event: CaptureEvent) -> bool {
        if !self.is_live() {
            log::debug!("dropping event from torn-down session: {:?}", event);
            return false;
        }
        self.sender.send((self.epoch, event)).is_ok()
    }
}

/// Consumer side of the UI event channel. Drain it on the UI thread.
pub struct EventStream {
    receiver: Receiver<(u64, CaptureEvent)>,
    epoch: Arc<AtomicU64>,
}

impl EventStream {
    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    pub fn try_recv(&self) -> Result<CaptureEvent, TryRecvError> {
        loop {
            let (epoch, event) = self.receiver.try_recv()?;
            if self.is_current(epoch) {
                return Ok(event);
            }
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<CaptureEvent, RecvTimeoutError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let (epoch, event) = self.receiver.recv_timeout(remaining)?;
            if self.is_current(epoch) {
                return Ok(event);
            }
        }
    }

    /// Everything currently buffered, stale events skipped.
    pub fn drain(&self) -> Vec<CaptureEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_ticket_delivers() {
        let (delivery, stream) = EventDelivery::channel();
        let ticket = delivery.ticket();
        assert!(ticket.deliver(CaptureEvent::FlashAvailabilityChanged(true)));
        assert_eq!(stream.try_recv().unwrap(), CaptureEvent::FlashAvailabilityChanged(true));
    }

    #[test]
    fn stale_ticket_is_a_no_op() {
        let (delivery, stream) = EventDelivery::channel();
        let ticket = delivery.ticket();
        delivery.advance_epoch();
        assert!(!ticket.deliver(CaptureEvent::FlashAvailabilityChanged(true)));
        assert!(stream.try_recv().is_err());
    }

    #[test]
    fn buffered_events_are_dropped_after_epoch_advance() {
        let (delivery, stream) = EventDelivery::channel();
        let old = delivery.ticket();
        old.deliver(CaptureEvent::FlashAvailabilityChanged(true));

        delivery.advance_epoch();
        let new = delivery.ticket();
        new.deliver(CaptureEvent::FlashAvailabilityChanged(false));

        assert_eq!(stream.drain(), vec![CaptureEvent::FlashAvailabilityChanged(false)]);
    }

    #[test]
    fn recv_timeout_skips_stale_then_times_out() {
        let (delivery, stream) = EventDelivery::channel();
        delivery.ticket().deliver(CaptureEvent::FlashAvailabilityChanged(true));
        delivery.advance_epoch();
        let result = stream.recv_timeout(Duration::from_millis(20));
        assert!(matches!(result, Err(RecvTimeoutError::Timeout)));
    }
}
