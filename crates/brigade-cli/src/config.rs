//! `brigade.toml` loading.

use brigade_agent::{ModelConfig, RetryPolicy};
use brigade_core::{BrigadeError, BrigadeResult};
use brigade_orchestrator::KitchenConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct BrigadeConfig {
    #[serde(default)]
    pub kitchen: KitchenConfig,
    /// Applied to models that carry no retry policy of their own.
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,
    #[serde(default)]
    pub default_model: Option<String>,
    /// When set, agent memories are written under this directory.
    #[serde(default)]
    pub memory_dir: Option<PathBuf>,
}

impl Default for BrigadeConfig {
    fn default() -> Self {
        Self {
            kitchen: KitchenConfig::default(),
            retry: None,
            models: default_models(),
            default_model: None,
            memory_dir: None,
        }
    }
}

fn default_models() -> Vec<ModelConfig> {
    vec![ModelConfig::simulated("simulated")]
}

impl BrigadeConfig {
    /// Read `path`. A missing file yields the defaults.
    pub async fn load(path: &Path) -> BrigadeResult<Self> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> BrigadeResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| BrigadeError::Config(format!("invalid brigade.toml: {e}")))?;
        config.kitchen.validate()?;
        if config.models.is_empty() {
            return Err(BrigadeError::Config("at least one model is required".into()));
        }
        Ok(config)
    }

    /// The model called `name`, or the default one, with the global retry
    /// policy filled in.
    pub fn model(&self, name: Option<&str>) -> BrigadeResult<ModelConfig> {
        let wanted = name.or(self.default_model.as_deref());
        let found = match wanted {
            Some(wanted) => self.models.iter().find(|m| m.name == wanted),
            None => self.models.first(),
        };
        let mut model = found.cloned().ok_or_else(|| {
            BrigadeError::Config(format!("unknown model '{}'", wanted.unwrap_or_default()))
        })?;
        if model.retry_policy.is_none() {
            model.retry_policy = self.retry.clone();
        }
        Ok(model)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use brigade_agent::ModelProvider;

    const SAMPLE: &str = r#"
default_model = "steady"

[retry]
max_retries = 1
backoff_base_ms = 10

[kitchen.assignment]
capacity = 6

[[models]]
name = "steady"
latency_ms = 5

[[models]]
name = "down"
provider = "offline"
"#;

    #[test]
    fn test_parse_sample() {
        let config = BrigadeConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.kitchen.assignment.capacity, 6);
        assert_eq!(config.kitchen.orders.reassign_priority_threshold, 8);
        assert_eq!(config.models.len(), 2);

        let steady = config.model(None).unwrap();
        assert_eq!(steady.name, "steady");
        assert_eq!(steady.retry_policy.unwrap().max_retries, 1);

        let down = config.model(Some("down")).unwrap();
        assert_eq!(down.provider, ModelProvider::Offline);
        assert!(config.model(Some("missing")).is_err());
    }

    #[test]
    fn test_invalid_kitchen_rejected() {
        let err = BrigadeConfig::parse("[kitchen.agents]\ntasks_per_step = 0\n").unwrap_err();
        assert!(err.to_string().contains("tasks_per_step"));
        assert!(BrigadeConfig::parse("models = []").is_err());
    }

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BrigadeConfig::load(&dir.path().join("brigade.toml"))
            .await
            .unwrap();
        assert_eq!(config.model(None).unwrap().name, "simulated");

        let path = dir.path().join("custom.toml");
        tokio::fs::write(&path, SAMPLE).await.unwrap();
        let config = BrigadeConfig::load(&path).await.unwrap();
        assert_eq!(config.default_model.as_deref(), Some("steady"));
    }
}
