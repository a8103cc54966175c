use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::{BackendError, Result};
use crate::models::{Connection, ConnectionFilter, ConnectionStatus};

const CONNECTION_COLUMNS: &str = "id, requester_id, recipient_id, status, created_at";

pub async fn list_connections(pool: &PgPool, filter: ConnectionFilter) -> Result<Vec<Connection>> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {CONNECTION_COLUMNS} FROM connections WHERE TRUE"));

    if let Some(requester) = filter.requester {
        query.push(" AND requester_id = ").push_bind(requester);
    }
    if let Some(recipient) = filter.recipient {
        query.push(" AND recipient_id = ").push_bind(recipient);
    }
    if let Some(participant) = filter.participant {
        query
            .push(" AND (requester_id = ")
            .push_bind(participant)
            .push(" OR recipient_id = ")
            .push_bind(participant)
            .push(")");
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    query.push(" ORDER BY created_at ASC");

    let connections = query
        .build_query_as::<Connection>()
        .fetch_all(pool)
        .await?;

    Ok(connections)
}

pub async fn find_connection_between(pool: &PgPool, a: Uuid, b: Uuid) -> Result<Option<Connection>> {
    let connection = sqlx::query_as::<_, Connection>(&format!(
        r#"
        SELECT {CONNECTION_COLUMNS}
        FROM connections
        WHERE (requester_id = $1 AND recipient_id = $2)
           OR (requester_id = $2 AND recipient_id = $1)
        "#
    ))
    .bind(a)
    .bind(b)
    .fetch_optional(pool)
    .await?;

    Ok(connection)
}

pub async fn insert_connection(pool: &PgPool, requester_id: Uuid, recipient_id: Uuid) -> Result<Connection> {
    sqlx::query_as::<_, Connection>(&format!(
        r#"
        INSERT INTO connections (requester_id, recipient_id, status)
        VALUES ($1, $2, $3)
        RETURNING {CONNECTION_COLUMNS}
        "#
    ))
    .bind(requester_id)
    .bind(recipient_id)
    .bind(ConnectionStatus::Pending)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return BackendError::DuplicateConnection {
                    requester: requester_id,
                    recipient: recipient_id,
                };
            }
        }
        BackendError::Database(e)
    })
}

pub async fn update_connection_status(
    pool: &PgPool,
    connection_id: Uuid,
    status: ConnectionStatus,
) -> Result<Option<Connection>> {
    let connection = sqlx::query_as::<_, Connection>(&format!(
        r#"
        UPDATE connections
        SET status = $2
        WHERE id = $1
        RETURNING {CONNECTION_COLUMNS}
        "#
    ))
    .bind(connection_id)
    .bind(status)
    .fetch_optional(pool)
    .await?;

    Ok(connection)
}

pub async fn delete_connection(pool: &PgPool, connection_id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM connections
        WHERE id = $1
        "#,
    )
    .bind(connection_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Scoped by status so a cancel cannot remove a connection that was accepted meanwhile.
pub async fn delete_pending_request(pool: &PgPool, requester_id: Uuid, recipient_id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM connections
        WHERE requester_id = $1 AND recipient_id = $2 AND status = $3
        "#,
    )
    .bind(requester_id)
    .bind(recipient_id)
    .bind(ConnectionStatus::Pending)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
