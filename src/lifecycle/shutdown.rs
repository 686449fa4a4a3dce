//! Shutdown flag shared by the foreground engine and the background subscriber.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Monotonic shutdown signal.
///
/// The flag half is polled by synchronous code (the engine checks it every
/// time a channel wait returns). The broadcast half wakes async tasks that
/// are parked in `tokio::select!`. Once triggered it is never reset.
#[derive(Debug, Clone)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new, untriggered shutdown signal.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            tx,
        }
    }

    /// Set the flag and wake every waiter. Idempotent.
    pub fn trigger(&self) {
        if !self.flag.swap(true, Ordering::AcqRel) {
            tracing::debug!("Shutdown flag set");
        }
        let _ = self.tx.send(());
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Resolve once shutdown has been requested, including before this call.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        if self.is_triggered() {
            return;
        }
        let _ = rx.recv().await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_flag_is_monotonic() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());
        shutdown.trigger();
        assert!(shutdown.is_triggered());
        shutdown.trigger();
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn test_clones_share_the_flag() {
        let shutdown = Shutdown::new();
        let other = shutdown.clone();
        std::thread::spawn(move || other.trigger()).join().unwrap();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_wait_after_trigger_returns() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        tokio::time::timeout(Duration::from_millis(100), shutdown.wait())
            .await
            .expect("wait should resolve immediately");
    }

    #[tokio::test]
    async fn test_wait_wakes_on_trigger() {
        let shutdown = Shutdown::new();
        let waiter = shutdown.clone();
        let task = tokio::spawn(async move { waiter.wait().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_trigger_wakes_every_waiter() {
        let shutdown = Shutdown::new();
        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let waiter = shutdown.clone();
                tokio::spawn(async move { waiter.wait().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.trigger();
        for task in tasks {
            tokio::time::timeout(Duration::from_secs(1), task)
                .await
                .expect("every waiter should wake")
                .unwrap();
        }
    }
}
