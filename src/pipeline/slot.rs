//! Single-slot, latest-wins handoff channel
//!
//! The producer never blocks: offering a value while one is still pending
//! replaces the pending value.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Producer side of a latest-wins slot
pub struct LatestSlot<T> {
    tx: Sender<T>,
    // Producer-held receiver used to evict a stale pending value
    drain: Receiver<T>,
}

/// Create a slot and the consumer's receiver
pub fn latest_slot<T>() -> (LatestSlot<T>, Receiver<T>) {
    let (tx, rx) = bounded(1);
    (
        LatestSlot {
            tx,
            drain: rx.clone(),
        },
        rx,
    )
}

impl<T> LatestSlot<T> {
    /// Put `value` in the slot. Returns true when a pending value was dropped.
    pub fn offer(&self, value: T) -> bool {
        match self.tx.try_send(value) {
            Ok(()) => false,
            Err(TrySendError::Full(value)) => {
                let dropped = self.drain.try_recv().is_ok();
                // Single producer: after the drain the slot is free
                let _ = self.tx.try_send(value);
                dropped
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}
