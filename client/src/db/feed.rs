use serde::Deserialize;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::messages::get_message;
use crate::backend::MessageFeed;
use crate::constants::{MESSAGE_FEED_CAPACITY, MESSAGE_INSERT_CHANNEL};
use crate::error::Result;

/// Keys sent by the insert trigger; the row itself is loaded afterwards.
#[derive(Debug, Deserialize, PartialEq)]
struct MessageInserted {
    id: Uuid,
    connection_id: Uuid,
}

/// Subscribes to the insert trigger on `messages` and forwards rows of one
/// connection. The listener task stops when the returned feed is dropped.
pub async fn listen_messages(pool: &PgPool, connection_id: Uuid) -> Result<MessageFeed> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(MESSAGE_INSERT_CHANNEL).await?;

    let (tx, rx) = broadcast::channel(MESSAGE_FEED_CAPACITY);
    let pool = pool.clone();

    let task = tokio::spawn(async move {
        debug!("Listening for messages on connection {}", connection_id);
        loop {
            let notification = match listener.recv().await {
                Ok(notification) => notification,
                Err(e) => {
                    error!("Message listener for connection {} stopped: {}", connection_id, e);
                    break;
                }
            };

            let inserted: MessageInserted = match serde_json::from_str(notification.payload()) {
                Ok(inserted) => inserted,
                Err(e) => {
                    warn!("Skipping malformed message notification: {}", e);
                    continue;
                }
            };

            if inserted.connection_id != connection_id {
                continue;
            }

            let message = match get_message(&pool, inserted.id).await {
                Ok(Some(message)) => message,
                // Deleted along with its connection before we got to it
                Ok(None) => continue,
                Err(e) => {
                    error!("Error loading message {}: {}", inserted.id, e);
                    continue;
                }
            };

            if tx.send(message).is_err() {
                // No receiver left
                break;
            }
        }
    });

    Ok(MessageFeed::new(connection_id, rx).with_listener(task))
}
