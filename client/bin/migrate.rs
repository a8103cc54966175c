use devconnect::db::{DatabaseConfig, migrations::run_migrations};
use devconnect::{get_db_pool, utils};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    utils::init_logging();

    let db_config = DatabaseConfig::from_env()?;
    let pool = get_db_pool(&db_config).await?;

    info!("Running database migrations...");
    let applied = run_migrations(&pool).await?;
    if applied.is_empty() {
        println!("Schema is up to date.");
    }
    for (version, description) in &applied {
        println!("Applied {:04} {}", version, description);
    }
    println!("{} migration(s) applied.", applied.len());

    Ok(())
}
