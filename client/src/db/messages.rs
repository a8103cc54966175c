use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Message, NewMessage};

pub async fn list_messages(pool: &PgPool, connection_id: Uuid) -> Result<Vec<Message>> {
    let messages = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, connection_id, sender_id, content, created_at
        FROM messages
        WHERE connection_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(connection_id)
    .fetch_all(pool)
    .await?;

    Ok(messages)
}

pub async fn get_message(pool: &PgPool, message_id: Uuid) -> Result<Option<Message>> {
    let message = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, connection_id, sender_id, content, created_at
        FROM messages
        WHERE id = $1
        "#,
    )
    .bind(message_id)
    .fetch_optional(pool)
    .await?;

    Ok(message)
}

pub async fn insert_message(pool: &PgPool, message: &NewMessage) -> Result<Message> {
    let message = sqlx::query_as::<_, Message>(
        r#"
        INSERT INTO messages (connection_id, sender_id, content)
        VALUES ($1, $2, $3)
        RETURNING id, connection_id, sender_id, content, created_at
        "#,
    )
    .bind(message.connection_id)
    .bind(message.sender_id)
    .bind(&message.content)
    .fetch_one(pool)
    .await?;

    Ok(message)
}
