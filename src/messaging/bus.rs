//! Broadcast bus for turn events.

use super::TurnEvent;
use tokio::sync::broadcast;

/// Sender half of the message bus.
#[derive(Clone)]
pub struct MessageSender {
    tx: broadcast::Sender<TurnEvent>,
}

impl MessageSender {
    /// Send an event.
    pub fn send(&self, event: TurnEvent) -> Result<(), BusError> {
        self.tx.send(event).map_err(|_| BusError::Closed)?;
        Ok(())
    }

    /// Send an event, ignoring the no-subscriber case.
    pub fn publish(&self, event: TurnEvent) {
        let _ = self.send(event);
    }
}

/// Receiver half of the message bus.
pub struct MessageReceiver {
    rx: broadcast::Receiver<TurnEvent>,
}

impl MessageReceiver {
    /// Receive the next event.
    pub async fn recv(&mut self) -> Result<TurnEvent, BusError> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => BusError::Closed,
            broadcast::error::RecvError::Lagged(n) => BusError::Lagged(n),
        })
    }

    /// Try to receive an event without waiting.
    pub fn try_recv(&mut self) -> Result<Option<TurnEvent>, BusError> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(BusError::Closed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => Err(BusError::Lagged(n)),
        }
    }
}

/// Message bus for coordinator-presenter notification.
pub struct MessageBus {
    tx: broadcast::Sender<TurnEvent>,
}

impl MessageBus {
    /// Create a new message bus.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a bus that buffers up to `capacity` events per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Get a sender.
    pub fn sender(&self) -> MessageSender {
        MessageSender {
            tx: self.tx.clone(),
        }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> MessageReceiver {
        MessageReceiver {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Bus errors.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Channel closed")]
    Closed,
    #[error("Lagged behind by {0} messages")]
    Lagged(u64),
}
