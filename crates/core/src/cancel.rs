use std::sync::Arc;

use tokio::sync::watch;

/// A cooperative cancellation signal.
///
/// Clones share the same signal. Cancelling is idempotent and can be done
/// from any thread, e.g. a Ctrl-C handler. The generation session only
/// looks at the signal between turns, so a request that is already in
/// flight always runs to completion.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled yet.
    #[inline]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Requests cancellation.
    #[inline]
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Returns whether cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Waits until cancellation is requested.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender is kept alive by `self`, so this can't fail.
        rx.wait_for(|cancelled| *cancelled).await.ok();
    }
}

impl Default for CancellationToken {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn test_cancel() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());

        token.cancel();
        token.cancel();
        assert!(observer.is_cancelled());
        timeout(Duration::from_millis(100), observer.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_cancel() {
        let token = CancellationToken::new();
        let waiter = tokio::spawn({
            let token = token.clone();
            async move { token.cancelled().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        token.cancel();
        timeout(Duration::from_millis(100), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
