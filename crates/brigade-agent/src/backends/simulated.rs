use super::{LlmBackend, RoleContext};
use crate::config::ModelConfig;
use async_trait::async_trait;
use brigade_core::BackendError;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

const CHOICES: [&str; 4] = [
    "proceed as planned",
    "proceed and notify the pass",
    "prioritize the oldest ticket",
    "double-check mise en place first",
];

/// A deterministic stand-in for a language model.
///
/// The reply depends only on the model name, the role context and the prompt.
/// Optional latency and a rate-limit cadence make it useful for exercising
/// the simulator's timeout and retry paths.
pub struct SimulatedBackend {
    name: String,
    latency: Duration,
    fail_every: Option<u32>,
    calls: AtomicU32,
}

impl SimulatedBackend {
    /// A simulated model with no latency and no failures.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latency: Duration::ZERO,
            fail_every: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Build from a model entry.
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            name: config.name.clone(),
            latency: Duration::from_millis(config.latency_ms),
            fail_every: config.fail_every.filter(|n| *n > 0),
            calls: AtomicU32::new(0),
        }
    }

    /// Sleep for `latency` before every reply.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl LlmBackend for SimulatedBackend {
    async fn complete(
        &self,
        prompt: &str,
        role_context: &RoleContext,
    ) -> Result<String, BackendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail_every.is_some_and(|n| call % n == 0) {
            return Err(BackendError::RateLimited);
        }

        let digest = prompt
            .bytes()
            .chain(role_context.task_type.bytes())
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
        let choice = CHOICES[digest as usize % CHOICES.len()];
        Ok(format!(
            "[{}] {} on {}: {choice}",
            self.name, role_context.role, role_context.task_type
        ))
    }
}
