use sqlx::PgPool;
use sqlx::migrate::Migrate;
use std::collections::HashSet;

use crate::error::Result;

/// Applies the bundled schema: profiles, connections, messages and the insert
/// feed trigger. Returns `(version, description)` of each migration applied by
/// this run.
pub async fn run_migrations(pool: &PgPool) -> Result<Vec<(i64, String)>> {
    let migrator = sqlx::migrate!("./migrations");

    let applied: HashSet<i64> = {
        let mut conn = pool.acquire().await?;
        conn.ensure_migrations_table().await?;
        conn.list_applied_migrations()
            .await?
            .into_iter()
            .map(|migration| migration.version)
            .collect()
    };

    migrator.run(pool).await?;

    Ok(migrator
        .iter()
        .filter(|migration| !applied.contains(&migration.version))
        .map(|migration| (migration.version, migration.description.to_string()))
        .collect())
}
