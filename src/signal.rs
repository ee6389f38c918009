use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    None,
    Cancel,
}

/// Cooperative cancellation shared between the binary's Ctrl-C handler, the
/// discussion loop and retry backoff. Observed only at suspension points.
#[derive(Clone)]
pub struct SignalHandler {
    signal: Arc<watch::Sender<Signal>>,
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalHandler {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Signal::None);
        Self {
            signal: Arc::new(tx),
        }
    }

    pub fn cancel(&self) {
        self.signal.send_replace(Signal::Cancel);
    }

    pub fn check(&self) -> Signal {
        *self.signal.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.check() == Signal::Cancel
    }

    /// Resolves once `cancel` has been called; pending forever otherwise.
    pub async fn cancelled(&self) {
        let mut rx = self.signal.subscribe();
        let woke = rx.wait_for(|s| *s == Signal::Cancel).await.map(|_| ());
        if woke.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_new_handler_is_not_cancelled() {
        let handler = SignalHandler::new();
        assert_eq!(handler.check(), Signal::None);
        assert!(!handler.is_cancelled());
    }

    #[test]
    fn test_cancel_is_visible_through_clones() {
        let handler = SignalHandler::new();
        let clone = handler.clone();
        clone.cancel();
        assert!(handler.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let handler = SignalHandler::new();
        let waiter = handler.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });

        handler.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("waiter should wake")
            .unwrap();
    }
}
