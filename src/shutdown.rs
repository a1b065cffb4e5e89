//! Broadcast shutdown signalling.
//!
//! `Shutdown` owns the only sender of a zero-capacity channel. Triggering it
//! drops that sender, which disconnects every cloned `ShutdownSignal` at once:
//! blocked receivers wake immediately and later checks see it too.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// The trigger side of a shutdown request.
#[derive(Debug)]
pub struct Shutdown {
    sender: Mutex<Option<Sender<()>>>,
    signal: ShutdownSignal,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(0);
        Self {
            sender: Mutex::new(Some(sender)),
            signal: ShutdownSignal { receiver },
        }
    }

    /// Request shutdown. Calling this more than once is harmless.
    pub fn trigger(&self) {
        let mut sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        sender.take();
    }

    pub fn is_triggered(&self) -> bool {
        self.signal.is_triggered()
    }

    /// A receiver that observes this shutdown.
    pub fn signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// The observing side of a shutdown request.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: Receiver<()>,
}

impl ShutdownSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self {
            receiver: crossbeam_channel::never(),
        }
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for up to `timeout`, returning `true` early if shutdown is triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => false,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        }
    }

    /// The raw receiver, for use inside `crossbeam_channel::select!`.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_trigger_reaches_all_clones() {
        let shutdown = Shutdown::new();
        let a = shutdown.signal();
        let b = a.clone();
        assert!(!a.is_triggered());

        shutdown.trigger();
        assert!(a.is_triggered());
        assert!(b.is_triggered());
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn test_wait_wakes_early() {
        let shutdown = std::sync::Arc::new(Shutdown::new());
        let signal = shutdown.signal();
        let trigger = shutdown.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            trigger.trigger();
        });

        let start = Instant::now();
        assert!(signal.wait_timeout(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_never_signal_times_out() {
        let signal = ShutdownSignal::never();
        assert!(!signal.wait_timeout(Duration::from_millis(5)));
        assert!(!signal.is_triggered());
    }
}
