//! Cancellation for background timers and backoff sleeps.
//!
//! A `ShutdownHandle` owns the only sender of a crossbeam channel. Triggering drops
//! that sender, so every cloned `ShutdownSignal` sees the channel disconnect at once:
//! `select!` arms on it fire immediately and pending sleeps return early.

use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError, select};

/// Owner side; dropping or triggering it cancels all signals.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: Mutex<Option<Sender<()>>>,
    signal: ShutdownSignal,
}

/// Cloneable observer side.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: Receiver<()>,
}

impl ShutdownHandle {
    /// A handle that has not been triggered yet.
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            tx: Mutex::new(Some(tx)),
            signal: ShutdownSignal { rx },
        }
    }

    /// A signal observing this handle.
    pub fn signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    /// Cancel every signal. Idempotent.
    pub fn trigger(&self) {
        let mut tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        tx.take();
    }

    /// Whether `trigger` was called.
    pub fn is_triggered(&self) -> bool {
        self.signal.is_shut_down()
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Whether the owning handle was triggered.
    pub fn is_shut_down(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for `duration` unless shutdown happens first.
    ///
    /// Returns `true` if the full duration elapsed, `false` if cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        select! {
            recv(self.rx) -> _ => false,
            default(duration) => true,
        }
    }

    /// Channel that disconnects on shutdown, for use in `select!` loops.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn sleep_completes_without_shutdown() {
        let handle = ShutdownHandle::new();
        assert!(handle.signal().sleep(Duration::from_millis(5)));
        assert!(!handle.is_triggered());
    }

    #[test]
    fn trigger_cancels_pending_sleep() {
        let handle = ShutdownHandle::new();
        let signal = handle.signal();
        let started = Instant::now();
        let sleeper = thread::spawn(move || signal.sleep(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(20));
        handle.trigger();
        assert!(!sleeper.join().unwrap());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(handle.signal().is_shut_down());
    }
}
