pub mod config;

pub use config::{ConfigError, DatabaseConfig, GridcatConfig, RoutesConfig, ServerConfig};
