use crate::engine::turn::Turn;
use std::sync::Arc;
use tokio::sync::broadcast;

pub const SUBSCRIBER_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct SseBroker {
    tx: broadcast::Sender<Arc<Turn>>,
}

impl SseBroker {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self { tx }
    }

    pub fn publish(&self, turn: Arc<Turn>) {
        let _ = self.tx.send(turn);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Turn>> {
        self.tx.subscribe()
    }
}

impl Default for SseBroker {
    fn default() -> Self {
        Self::new()
    }
}
