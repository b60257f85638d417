//! Application configuration loaded from `config.toml` with environment overrides.
//!
//! The file is optional. Every field has a default, and the environment
//! variables `DATABASE_URL`, `CRON_SECRET`, `APP_ENV`, `SERVER_HOST` and
//! `SERVER_PORT` win over whatever the file says. The loaded configuration is
//! shared as an `Arc<AppConfig>`; nothing in the crate keeps module-level
//! mutable state.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::{path::Path, str::FromStr};
use tracing::{debug, info, warn};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Deployment environment, controls how strictly the scheduled trigger is guarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development: an unconfigured cron secret lets scheduled calls through
    #[default]
    Development,
    /// Production: the scheduled trigger always requires a secret
    Production,
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(Error::Config {
                message: format!("Unknown environment '{other}'"),
            }),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Settings for the recurrence engine and its trigger surfaces
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecurringConfig {
    /// Shared secret the external scheduler presents as a bearer token
    pub cron_secret: Option<String>,
    /// Deployment environment
    pub environment: Environment,
    /// Optional upper bound on cycles materialized for one rule in one drain.
    /// Unset means a drain always reaches the present.
    pub max_catch_up_cycles: Option<u32>,
    /// Appended to the rule description of every generated transaction
    pub description_suffix: String,
}

impl Default for RecurringConfig {
    fn default() -> Self {
        Self {
            cron_secret: None,
            environment: Environment::Development,
            max_catch_up_cycles: None,
            description_suffix: " (Recurring)".to_string(),
        }
    }
}

/// Maps a session bearer token to the user it identifies
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Opaque session token
    pub token: String,
    /// Owner id the token resolves to
    pub user_id: String,
}

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `SeaORM` connection string
    pub database_url: String,
    /// HTTP listener
    pub server: ServerConfig,
    /// Recurrence engine settings
    pub recurring: RecurringConfig,
    /// Users allowed to run the manual trigger
    pub admin_user_ids: Vec<String>,
    /// Session tokens accepted by the HTTP identity provider
    pub sessions: Vec<SessionConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/finance_buddy.sqlite?mode=rwc".to_string(),
            server: ServerConfig::default(),
            recurring: RecurringConfig::default(),
            admin_user_ids: Vec::new(),
            sessions: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Returns true when `user_id` may run the manual recurring trigger.
    #[must_use]
    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_user_ids.iter().any(|id| id == user_id)
    }

    /// Applies overrides from a variable lookup (the process environment in
    /// production, a closure in tests).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(secret) = lookup("CRON_SECRET") {
            let secret = secret.trim().to_string();
            self.recurring.cron_secret = (!secret.is_empty()).then_some(secret);
        }
        if let Some(env) = lookup("APP_ENV") {
            self.recurring.environment = env.parse()?;
        }
        if let Some(host) = lookup("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SERVER_PORT") {
            self.server.port = port.parse().map_err(|e| Error::Config {
                message: format!("Invalid SERVER_PORT '{port}': {e}"),
            })?;
        }
        Ok(self)
    }
}

/// Parses configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads configuration from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_config(&contents)
}

/// Loads the configuration used by the binary: `CONFIG_PATH` (or
/// `config.toml`) if present, defaults otherwise, then environment overrides.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let base = if Path::new(&path).exists() {
        debug!("Loading configuration from {path}");
        load_config(&path)?
    } else {
        warn!("No configuration file at {path}, using defaults");
        AppConfig::default()
    };

    let config = base.with_overrides(|key| std::env::var(key).ok())?;
    if config.recurring.environment == Environment::Production
        && config.recurring.cron_secret.is_none()
    {
        warn!("CRON_SECRET is not set: scheduled recurring runs will be rejected");
    }
    info!(
        "Configuration loaded ({} admin(s), {} session token(s))",
        config.admin_user_ids.len(),
        config.sessions.len()
    );
    Ok(config)
}
