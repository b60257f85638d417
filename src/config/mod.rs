/// Application settings from config.toml and the environment
pub mod app;

/// Database configuration and connection management
pub mod database;

pub use app::{AppConfig, Environment, RecurringConfig, ServerConfig, load_app_configuration};
