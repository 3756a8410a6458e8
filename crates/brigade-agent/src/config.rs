use crate::failover::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Which backend implementation serves a model entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// Deterministic in-process model.
    #[default]
    Simulated,
    /// A model that is never reachable. Useful to benchmark degraded runs.
    Offline,
}

/// A selectable model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Name used to select the model.
    pub name: String,
    #[serde(default)]
    pub provider: ModelProvider,
    /// Simulated response latency.
    #[serde(default)]
    pub latency_ms: u64,
    /// Every n-th call is rate limited (simulated provider only).
    #[serde(default)]
    pub fail_every: Option<u32>,
    #[serde(default)]
    pub fallback_models: Vec<ModelConfig>,
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
}

impl ModelConfig {
    /// A simulated model with no latency and no failures.
    pub fn simulated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: ModelProvider::Simulated,
            latency_ms: 0,
            fail_every: None,
            fallback_models: Vec::new(),
            retry_policy: None,
        }
    }
}
