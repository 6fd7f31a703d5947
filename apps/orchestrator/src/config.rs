//! Orchestrator configuration: primary-queue, secondary-bus, and collaborator
//! connection settings, all loaded from the environment.

use core_config::{env_or_default, env_required, ConfigError, FromEnv};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub redis_url: String,
    pub qdrant_url: String,
    pub qdrant_vector_size: u64,
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub embedding_model: String,
    pub health_port: u16,
    pub max_concurrent_jobs: usize,
}

impl FromEnv for OrchestratorConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let vector_size = env_or_default("QDRANT_VECTOR_SIZE", "1536")
            .parse()
            .map_err(|e| ConfigError::ParseError {
                key: "QDRANT_VECTOR_SIZE".to_string(),
                details: format!("{e}"),
            })?;
        let health_port = env_or_default("ORCHESTRATOR_HEALTH_PORT", "8080")
            .parse()
            .map_err(|e| ConfigError::ParseError {
                key: "ORCHESTRATOR_HEALTH_PORT".to_string(),
                details: format!("{e}"),
            })?;
        let max_concurrent_jobs = env_or_default("ORCHESTRATOR_MAX_CONCURRENT_JOBS", "20")
            .parse()
            .map_err(|e| ConfigError::ParseError {
                key: "ORCHESTRATOR_MAX_CONCURRENT_JOBS".to_string(),
                details: format!("{e}"),
            })?;

        Ok(Self {
            redis_url: env_required("REDIS_HOST")?,
            qdrant_url: env_or_default("QDRANT_URL", "http://localhost:6334"),
            qdrant_vector_size: vector_size,
            llm_base_url: env_required("LLM_BASE_URL")?,
            llm_api_key: env_or_default("LLM_API_KEY", ""),
            llm_model: env_or_default("LLM_MODEL", "gpt-4o-mini"),
            embedding_model: env_or_default("EMBEDDING_MODEL", "text-embedding-3-small"),
            health_port,
            max_concurrent_jobs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_requires_redis_and_llm_base_url() {
        temp_env::with_vars_unset(["REDIS_HOST", "LLM_BASE_URL"], || {
            assert!(OrchestratorConfig::from_env().is_err());
        });
    }

    #[test]
    fn from_env_fills_in_defaults() {
        temp_env::with_vars(
            [
                ("REDIS_HOST", Some("redis://localhost:6379")),
                ("LLM_BASE_URL", Some("https://api.openai.com/v1")),
            ],
            || {
                let config = OrchestratorConfig::from_env().unwrap();
                assert_eq!(config.qdrant_vector_size, 1536);
                assert_eq!(config.health_port, 8080);
                assert_eq!(config.llm_model, "gpt-4o-mini");
            },
        );
    }
}
