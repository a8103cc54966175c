use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use crate::models::Message;

/// Live subscription to inserted messages of one connection.
///
/// Dropping the feed releases the subscription, including any listener task
/// that was spawned for it.
#[derive(Debug)]
pub struct MessageFeed {
    connection_id: Uuid,
    rx: broadcast::Receiver<Message>,
    listener: Option<JoinHandle<()>>,
}

impl MessageFeed {
    pub fn new(connection_id: Uuid, rx: broadcast::Receiver<Message>) -> Self {
        Self {
            connection_id,
            rx,
            listener: None,
        }
    }

    /// Ties a forwarding task to this feed; it is aborted when the feed is dropped.
    pub fn with_listener(mut self, listener: JoinHandle<()>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Waits for the next row of this connection. `None` once the feed has closed.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            match self.rx.recv().await {
                Ok(message) if message.connection_id == self.connection_id => return Some(message),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Message feed for connection {} lagged by {} rows",
                        self.connection_id, skipped
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next row already delivered, without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        loop {
            match self.rx.try_recv() {
                Ok(message) if message.connection_id == self.connection_id => return Some(message),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(
                        "Message feed for connection {} lagged by {} rows",
                        self.connection_id, skipped
                    );
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for MessageFeed {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}
