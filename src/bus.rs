use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Broadcast topic with bounded capacity.
/// `T` must be `Send + Sync` because messages cross from tokio tasks to the
/// control thread and back.
#[derive(Debug, Clone)]
pub struct Topic<T> {
    name: &'static str,
    tx: broadcast::Sender<Arc<T>>,
}

impl<T: Send + Sync + 'static> Topic<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { name, tx }
    }

    /// Publish to every current subscriber. Having none is not an error.
    pub fn publish(&self, msg: T) {
        let _ = self.tx.send(Arc::new(msg));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        self.tx.subscribe()
    }

    /// Non-blocking: drain `rx` and keep only the newest message.
    pub fn latest(&self, rx: &mut broadcast::Receiver<Arc<T>>) -> Option<Arc<T>> {
        let mut newest = None;
        loop {
            match rx.try_recv() {
                Ok(msg) => newest = Some(msg),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(topic = self.name, skipped = n, "receiver lagged");
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return newest,
            }
        }
    }
}
