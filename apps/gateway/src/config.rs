//! Gateway configuration: server, Redis, job-stream, and per-endpoint-class
//! rate-limit settings, all loaded from the environment.

use core_config::server::ServerConfig;
use core_config::{env_or_default, env_required, ConfigError, Environment, FromEnv};
use database::redis::RedisConfig;

/// Per-minute request caps, keyed by endpoint class.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub chat_per_minute: u32,
    pub auth_per_minute: u32,
    pub file_upload_per_minute: u32,
    pub admin_per_minute: u32,
    pub default_per_minute: u32,
}

impl RateLimitConfig {
    pub fn limit_for(&self, class: &str) -> u32 {
        match class {
            "chat" => self.chat_per_minute,
            "auth" => self.auth_per_minute,
            "file-upload" => self.file_upload_per_minute,
            "admin" => self.admin_per_minute,
            _ => self.default_per_minute,
        }
    }
}

impl FromEnv for RateLimitConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let parse = |key: &str, default: &str| -> Result<u32, ConfigError> {
            env_or_default(key, default)
                .parse()
                .map_err(|e| ConfigError::ParseError { key: key.to_string(), details: format!("{e}") })
        };

        Ok(Self {
            chat_per_minute: parse("RATE_LIMIT_CHAT_PER_MINUTE", "30")?,
            auth_per_minute: parse("RATE_LIMIT_AUTH_PER_MINUTE", "20")?,
            file_upload_per_minute: parse("RATE_LIMIT_FILE_UPLOAD_PER_MINUTE", "10")?,
            admin_per_minute: parse("RATE_LIMIT_ADMIN_PER_MINUTE", "100")?,
            default_per_minute: parse("RATE_LIMIT_DEFAULT_PER_MINUTE", "60")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub jobs_stream: String,
    pub rate_limit: RateLimitConfig,
    pub jwt_secret: Option<String>,
    pub max_message_chars: usize,
    pub max_upload_size_mb: u64,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            environment: Environment::from_env(),
            server: ServerConfig::from_env()?,
            redis: RedisConfig::new(env_required("REDIS_HOST")?),
            jobs_stream: env_or_default("JOBS_STREAM", "jobs:stream"),
            rate_limit: RateLimitConfig::from_env()?,
            jwt_secret: std::env::var("JWT_SECRET").ok(),
            max_message_chars: env_or_default("MAX_MESSAGE_CHARS", "50000")
                .parse()
                .map_err(|e| ConfigError::ParseError { key: "MAX_MESSAGE_CHARS".to_string(), details: format!("{e}") })?,
            max_upload_size_mb: env_or_default("MAX_UPLOAD_SIZE_MB", "5")
                .parse()
                .map_err(|e| ConfigError::ParseError { key: "MAX_UPLOAD_SIZE_MB".to_string(), details: format!("{e}") })?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_defaults_match_endpoint_classes() {
        temp_env::with_vars(
            [
                ("RATE_LIMIT_CHAT_PER_MINUTE", None::<&str>),
                ("RATE_LIMIT_AUTH_PER_MINUTE", None::<&str>),
                ("RATE_LIMIT_FILE_UPLOAD_PER_MINUTE", None::<&str>),
                ("RATE_LIMIT_ADMIN_PER_MINUTE", None::<&str>),
                ("RATE_LIMIT_DEFAULT_PER_MINUTE", None::<&str>),
            ],
            || {
                let config = RateLimitConfig::from_env().unwrap();
                assert_eq!(config.limit_for("chat"), 30);
                assert_eq!(config.limit_for("auth"), 20);
                assert_eq!(config.limit_for("file-upload"), 10);
                assert_eq!(config.limit_for("admin"), 100);
                assert_eq!(config.limit_for("anything-else"), 60);
            },
        );
    }

    #[test]
    fn from_env_requires_redis_host() {
        temp_env::with_var_unset("REDIS_HOST", || {
            assert!(GatewayConfig::from_env().is_err());
        });
    }
}
