pub mod connection;
pub mod connections;
pub mod feed;
pub mod messages;
pub mod migrations;
pub mod profiles;

pub use connection::{get_db_pool, DatabaseConfig};

#[cfg(test)]
static TEST_MIGRATE_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

/// Pool against `DATABASE_URL` with migrations applied, or `None` when no
/// database is configured for the test run.
#[cfg(test)]
pub(crate) async fn test_pool() -> Option<sqlx::PgPool> {
    dotenvy::dotenv().ok();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        tracing::warn!("DATABASE_URL not set, skipping database test");
        return None;
    };
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(4)
        .connect(&database_url)
        .await
        .expect("connect to DATABASE_URL");
    {
        let _guard = TEST_MIGRATE_LOCK.lock().await;
        migrations::run_migrations(&pool)
            .await
            .expect("apply migrations");
    }
    Some(pool)
}
