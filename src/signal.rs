//! One-shot synchronization primitives
//!
//! - `Signal`: a close notification that fires at most once and can be
//!   observed by any number of tasks.
//! - `Gate`: a one-shot hand-off that blocks a waiter until another actor
//!   opens it with a value.

use std::sync::Arc;

use tokio::sync::{oneshot, watch};

/// Broadcast-once cancellation flag
#[derive(Debug, Clone)]
pub struct Signal {
    state: Arc<watch::Sender<bool>>,
}

impl Signal {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Fire the signal. Firing again is a no-op.
    pub fn fire(&self) {
        self.state.send_replace(true);
    }

    /// Non-blocking check
    pub fn is_fired(&self) -> bool {
        *self.state.borrow()
    }

    /// Wait until the signal has fired
    pub async fn fired(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so this only returns once fired.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a connected gate pair
pub fn gate<T>() -> (Gate<T>, GateWait<T>) {
    let (tx, rx) = oneshot::channel();
    (Gate(tx), GateWait(rx))
}

/// Opening side of a gate
#[derive(Debug)]
pub struct Gate<T>(oneshot::Sender<T>);

impl<T> Gate<T> {
    /// Open the gate, releasing the waiter with `value`
    pub fn open(self, value: T) {
        // The waiter may already be gone; nothing to release then.
        let _ = self.0.send(value);
    }
}

/// Waiting side of a gate
#[derive(Debug)]
pub struct GateWait<T>(oneshot::Receiver<T>);

impl<T: Default> GateWait<T> {
    /// Wait for the gate to open
    ///
    /// A gate dropped without being opened yields `T::default()`.
    pub async fn wait(self) -> T {
        self.0.await.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_signal_fire_is_idempotent() {
        let signal = Signal::new();
        assert!(!signal.is_fired());

        signal.fire();
        signal.fire();

        assert!(signal.is_fired());
    }

    #[tokio::test]
    async fn test_signal_wakes_waiters() {
        let signal = Signal::new();
        let observer = signal.clone();

        let waiter = tokio::spawn(async move { observer.fired().await });
        signal.fire();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter not woken")
            .unwrap();
    }

    #[tokio::test]
    async fn test_signal_already_fired_returns_immediately() {
        let signal = Signal::new();
        signal.fire();

        tokio::time::timeout(Duration::from_millis(100), signal.fired())
            .await
            .expect("fired signal should not block");
    }

    #[tokio::test]
    async fn test_gate_delivers_value() {
        let (gate, wait) = gate::<Option<u32>>();
        gate.open(Some(7));
        assert_eq!(wait.wait().await, Some(7));
    }

    #[tokio::test]
    async fn test_dropped_gate_yields_default() {
        let (gate, wait) = gate::<Option<u32>>();
        drop(gate);
        assert_eq!(wait.wait().await, None);
    }
}
