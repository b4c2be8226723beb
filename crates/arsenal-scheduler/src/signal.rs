use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::types::Signature;

/// Completion channel between the queues and `await_signature` callers.
///
/// Whenever a task leaves a queue — executed, removed, or pruned during a
/// reload — the owning queue notifies the board and every waiter for that
/// signature resolves. This replaces fixed-interval polling for completion
/// detection.
#[derive(Default)]
pub struct CompletionBoard {
    waiters: Mutex<HashMap<Signature, Vec<oneshot::Sender<()>>>>,
}

impl CompletionBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in a signature. The receiver resolves when the
    /// task leaves its queue.
    pub fn subscribe(&self, signature: Signature) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.waiters
            .lock()
            .unwrap()
            .entry(signature)
            .or_default()
            .push(tx);
        rx
    }

    /// Resolve all waiters for a signature. No-op when nobody is waiting.
    pub fn notify(&self, signature: Signature) {
        if let Some(senders) = self.waiters.lock().unwrap().remove(&signature) {
            for tx in senders {
                // A dropped receiver just means the caller stopped waiting.
                let _ = tx.send(());
            }
        }
    }

    pub fn notify_all<I: IntoIterator<Item = Signature>>(&self, signatures: I) {
        for sig in signatures {
            self.notify(sig);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn notify_resolves_subscriber() {
        let board = CompletionBoard::new();
        let sig = Uuid::new_v4();
        let rx = board.subscribe(sig);
        board.notify(sig);
        assert!(rx.await.is_ok());
    }

    #[tokio::test]
    async fn notify_without_subscribers_is_noop() {
        let board = CompletionBoard::new();
        board.notify(Uuid::new_v4());
    }
}
