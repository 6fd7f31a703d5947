//! Analytics-worker configuration: secondary-bus, Redis, and windowing
//! settings, all loaded from the environment.

use bus::BusConfig;
use core_config::server::ServerConfig;
use core_config::{env_or_default, env_required, ConfigError, Environment, FromEnv};
use database::redis::RedisConfig;

#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    pub environment: Environment,
    pub bus: BusConfig,
    pub redis: RedisConfig,
    pub window_minutes: i64,
    pub batch_size: usize,
    pub health: ServerConfig,
}

impl FromEnv for AnalyticsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let bus = BusConfig::from_env()?;
        let batch_size = bus.batch_size;
        let window_minutes = env_or_default("ANALYTICS_WINDOW_MINUTES", "5")
            .parse()
            .map_err(|e| ConfigError::ParseError { key: "ANALYTICS_WINDOW_MINUTES".to_string(), details: format!("{e}") })?;

        Ok(Self {
            environment: Environment::from_env(),
            redis: RedisConfig::new(env_required("REDIS_HOST")?),
            bus,
            window_minutes,
            batch_size,
            health: ServerConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_defaults_window_to_five_minutes() {
        temp_env::with_vars(
            [
                ("NATS_URL", Some("nats://localhost:4222")),
                ("REDIS_HOST", Some("redis://localhost:6379")),
                ("ANALYTICS_WINDOW_MINUTES", None::<&str>),
            ],
            || {
                let config = AnalyticsConfig::from_env().unwrap();
                assert_eq!(config.window_minutes, 5);
            },
        );
    }
}
