pub mod backend;
pub mod constants;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod session;
pub mod utils;
pub mod views;

pub use utils::config::Config;
pub use db::connection::get_db_pool;
pub use error::{BackendError, ClientError};
pub use session::Session;

// Re-export common types
pub use sqlx::PgPool;
pub use uuid::Uuid;
pub use chrono::{DateTime, Utc};
