pub mod config;
pub mod format;
pub mod logging;
pub mod validation;

pub use config::Config;
pub use logging::init_logging;
