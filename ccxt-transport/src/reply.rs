//! Single-slot rendezvous between the input report path and a waiting exchange
//!
//! Each exchange arms a fresh one-shot channel before sending its frame. The
//! input path takes the armed sender, if any, and completes it exactly once.
//! Reports arriving while nothing is armed (or after the armed wait already
//! completed) are dropped; nothing is queued.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::warn;

use crate::protocol::InFrame;

#[derive(Default)]
pub(crate) struct ReplySlot {
    /// Short lock: guards only the arm/take race, never held across I/O
    waiter: Mutex<Option<oneshot::Sender<InFrame>>>,
}

impl ReplySlot {
    /// Arm the slot for the next reply, discarding any stale waiter
    pub(crate) fn arm(&self) -> oneshot::Receiver<InFrame> {
        let (tx, rx) = oneshot::channel();
        *self.waiter.lock() = Some(tx);
        rx
    }

    /// Give up on the armed wait (timeout or failed send)
    pub(crate) fn disarm(&self) {
        self.waiter.lock().take();
    }

    /// Complete the armed wait with `report`. Returns false if the report was dropped.
    pub(crate) fn deliver(&self, report: &[u8]) -> bool {
        let waiter = self.waiter.lock().take();
        match waiter {
            Some(tx) => tx.send(InFrame::capture(report)).is_ok(),
            None => false,
        }
    }
}

/// Handle through which the transport substrate hands over input reports
#[derive(Clone)]
pub struct ReplyCapture {
    slot: Arc<ReplySlot>,
}

impl ReplyCapture {
    pub(crate) fn new(slot: Arc<ReplySlot>) -> Self {
        Self { slot }
    }

    /// Offer one raw input report. Returns false if no exchange was waiting for it.
    pub fn deliver(&self, report: &[u8]) -> bool {
        let accepted = self.slot.deliver(report);
        if !accepted {
            warn!("dropping unsolicited {} byte report", report.len());
        }
        accepted
    }
}
