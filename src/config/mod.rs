//! Application configuration
//!
//! Loaded once at start-up from environment variables with the
//! `SUBSCRIPTION_GATE` prefix, after reading `.env` if one exists. Nested
//! values use `__` as separator.
//!
//! # Example
//!
//! ```no_run
//! use subscription_gate::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod platform;
mod server;
mod sweeper;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use platform::PlatformConfig;
pub use server::{Environment, ServerConfig};
pub use sweeper::{ScheduleKind, SweepSchedule, SweeperConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub platform: PlatformConfig,

    #[serde(default)]
    pub sweeper: SweeperConfig,
}

impl AppConfig {
    /// Load configuration from the environment.
    ///
    /// - `SUBSCRIPTION_GATE__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `SUBSCRIPTION_GATE__PLATFORM__GROUP_ID=-100...` -> `platform.group_id`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a required value is missing or a value
    /// cannot be parsed into its field type.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SUBSCRIPTION_GATE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Semantic validation of every section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.platform.validate(&self.server.environment)?;
        self.sweeper.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "SUBSCRIPTION_GATE__DATABASE__URL",
        "SUBSCRIPTION_GATE__PLATFORM__BOT_TOKEN",
        "SUBSCRIPTION_GATE__PLATFORM__GROUP_ID",
        "SUBSCRIPTION_GATE__PLATFORM__WEBHOOK_URL",
        "SUBSCRIPTION_GATE__SERVER__PORT",
        "SUBSCRIPTION_GATE__SERVER__ENVIRONMENT",
        "SUBSCRIPTION_GATE__SWEEPER__SCHEDULE",
        "SUBSCRIPTION_GATE__SWEEPER__DAILY_AT",
    ];

    fn set_minimal_env() {
        env::set_var("SUBSCRIPTION_GATE__DATABASE__URL", "postgres://gate@localhost/gate");
        env::set_var("SUBSCRIPTION_GATE__PLATFORM__BOT_TOKEN", "123:abc");
        env::set_var("SUBSCRIPTION_GATE__PLATFORM__GROUP_ID", "-1001234567890");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn loads_minimal_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert_eq!(config.database.url, "postgres://gate@localhost/gate");
        assert_eq!(config.platform.group_id, -1001234567890);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
        assert!(config.sweeper.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_platform_section_fails() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("SUBSCRIPTION_GATE__DATABASE__URL", "postgres://gate@localhost/gate");
        let result = AppConfig::load();
        clear_env();

        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }

    #[test]
    fn overrides_nested_values() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("SUBSCRIPTION_GATE__SERVER__PORT", "3000");
        env::set_var("SUBSCRIPTION_GATE__SWEEPER__SCHEDULE", "daily");
        env::set_var("SUBSCRIPTION_GATE__SWEEPER__DAILY_AT", "02:15");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.sweeper.schedule, ScheduleKind::Daily);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn production_rejects_plain_http_webhook() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("SUBSCRIPTION_GATE__SERVER__ENVIRONMENT", "production");
        env::set_var(
            "SUBSCRIPTION_GATE__PLATFORM__WEBHOOK_URL",
            "http://gate.example.com/webhook/telegram",
        );
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
        assert_eq!(config.validate(), Err(ValidationError::WebhookMustBeHttps));
    }
}
