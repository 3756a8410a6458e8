pub mod scripted;
pub mod simulated;

use crate::config::{ModelConfig, ModelProvider};
use crate::failover::FailoverBackend;
use async_trait::async_trait;
use brigade_core::{BackendError, BrigadeResult};
use std::sync::Arc;

/// Describes the agent issuing a completion request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleContext {
    /// Role tag, e.g. `sous_chef`.
    pub role: String,
    /// Agent display name.
    pub agent: String,
    /// Station the agent works, if any.
    pub station: Option<String>,
    /// Task type being decided.
    pub task_type: String,
}

/// A language model as seen by the simulator.
///
/// Implementations may take arbitrary time; callers bound the wait with a
/// timeout. Every error is recoverable from the caller's point of view.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Produce a decision for `prompt` on behalf of `role_context`.
    async fn complete(&self, prompt: &str, role_context: &RoleContext)
        -> Result<String, BackendError>;
}

/// Build the backend described by `config`, wrapped in a [`FailoverBackend`]
/// when a retry policy or fallback models are configured.
pub fn create_backend(config: &ModelConfig) -> BrigadeResult<Arc<dyn LlmBackend>> {
    let primary = single_backend(config);
    if config.fallback_models.is_empty() && config.retry_policy.is_none() {
        return Ok(primary);
    }

    let mut chain: Vec<Arc<dyn LlmBackend>> = vec![primary];
    chain.extend(config.fallback_models.iter().map(single_backend));
    let policy = config.retry_policy.clone().unwrap_or_default();
    Ok(Arc::new(FailoverBackend::new(chain, policy)?))
}

fn single_backend(config: &ModelConfig) -> Arc<dyn LlmBackend> {
    match config.provider {
        ModelProvider::Simulated => Arc::new(simulated::SimulatedBackend::from_config(config)),
        ModelProvider::Offline => Arc::new(scripted::ScriptedBackend::always(Err(
            BackendError::Unavailable,
        ))),
    }
}
