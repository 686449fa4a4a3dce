//! Notification channel between the stream subscriber and the engine.
//!
//! # Data Flow
//! ```text
//! subscriber (background runtime) ── push ──▶ queue ── pop ──▶ engine (foreground thread)
//!                                                              └─ acknowledge
//! ```
//!
//! # Design Decisions
//! - Unbounded: `push` never blocks the subscriber's event loop
//! - Internally synchronised: neither side holds a lock
//! - Acknowledgement is bookkeeping only; it never changes delivery order
//! - FIFO per producer; senders are `Clone` for additional stream sources

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::envelope::Envelope;
use crate::observability::metrics;

/// Why a `pop` returned without an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PopError {
    /// The timeout elapsed with nothing queued.
    #[error("no notification within the timeout")]
    Empty,
    /// Every sender is gone and the queue is drained.
    #[error("notification channel disconnected")]
    Disconnected,
}

/// Create a connected sender/receiver pair.
pub fn notification_channel() -> (NotificationSender, NotificationReceiver) {
    let (tx, rx) = unbounded();
    let unfinished = Arc::new(AtomicU64::new(0));
    (
        NotificationSender {
            tx,
            unfinished: Arc::clone(&unfinished),
        },
        NotificationReceiver {
            rx,
            unfinished,
            awaiting_ack: false,
        },
    )
}

/// Producer side. Cheap to clone.
#[derive(Debug, Clone)]
pub struct NotificationSender {
    tx: Sender<Envelope>,
    unfinished: Arc<AtomicU64>,
}

impl NotificationSender {
    /// Enqueue an envelope without blocking.
    ///
    /// Hands the envelope back if the receiver has been torn down.
    pub fn push(&self, envelope: Envelope) -> Result<(), Envelope> {
        // Count before sending so `acknowledge` can never run ahead of it.
        let count = self.unfinished.fetch_add(1, Ordering::AcqRel) + 1;
        match self.tx.send(envelope) {
            Ok(()) => {
                metrics::record_channel_unfinished(count);
                Ok(())
            }
            Err(e) => {
                self.unfinished.fetch_sub(1, Ordering::AcqRel);
                Err(e.into_inner())
            }
        }
    }

    /// Items pushed but not yet acknowledged.
    pub fn unfinished(&self) -> u64 {
        self.unfinished.load(Ordering::Acquire)
    }
}

/// Consumer side. Owned by the foreground engine.
#[derive(Debug)]
pub struct NotificationReceiver {
    rx: Receiver<Envelope>,
    unfinished: Arc<AtomicU64>,
    awaiting_ack: bool,
}

impl NotificationReceiver {
    /// Take the next envelope in FIFO order.
    ///
    /// `None` blocks until an item arrives; `Some(timeout)` gives up with
    /// [`PopError::Empty`] once the timeout elapses.
    pub fn pop(&mut self, timeout: Option<Duration>) -> Result<Envelope, PopError> {
        let envelope = match timeout {
            None => self.rx.recv().map_err(|_| PopError::Disconnected)?,
            Some(t) => self.rx.recv_timeout(t).map_err(|e| match e {
                RecvTimeoutError::Timeout => PopError::Empty,
                RecvTimeoutError::Disconnected => PopError::Disconnected,
            })?,
        };
        if self.awaiting_ack {
            tracing::trace!("Previous notification popped without acknowledgement");
        }
        self.awaiting_ack = true;
        Ok(envelope)
    }

    /// Take the next envelope if one is already queued.
    pub fn try_pop(&mut self) -> Option<Envelope> {
        let envelope = self.rx.try_recv().ok()?;
        self.awaiting_ack = true;
        Some(envelope)
    }

    /// Mark the most recently popped envelope as fully processed.
    ///
    /// Returns `false` if there was nothing outstanding to acknowledge.
    pub fn acknowledge(&mut self) -> bool {
        if !self.awaiting_ack {
            return false;
        }
        self.awaiting_ack = false;
        let remaining = self
            .unfinished
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map(|prev| prev - 1)
            .unwrap_or(0);
        metrics::record_channel_unfinished(remaining);
        true
    }

    /// Items pushed but not yet acknowledged.
    pub fn unfinished(&self) -> u64 {
        self.unfinished.load(Ordering::Acquire)
    }

    /// Items currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
