use super::{LlmBackend, RoleContext};
use async_trait::async_trait;
use brigade_core::BackendError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

/// Replays a fixed sequence of results, then repeats a fallback forever.
///
/// Prompts are recorded so tests can assert on the context an agent sent.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, BackendError>>>,
    fallback: Result<String, BackendError>,
    prompts: Mutex<Vec<(RoleContext, String)>>,
    call_count: AtomicU32,
}

impl ScriptedBackend {
    /// Play `script` in order, then keep returning `fallback`.
    pub fn new(
        script: Vec<Result<String, BackendError>>,
        fallback: Result<String, BackendError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            prompts: Mutex::new(Vec::new()),
            call_count: AtomicU32::new(0),
        }
    }

    /// Always return the same result.
    pub fn always(result: Result<String, BackendError>) -> Self {
        Self::new(Vec::new(), result)
    }

    /// Number of `complete` calls so far.
    pub fn calls(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every prompt received so far, in call order.
    pub async fn prompts(&self) -> Vec<(RoleContext, String)> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn complete(
        &self,
        prompt: &str,
        role_context: &RoleContext,
    ) -> Result<String, BackendError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .await
            .push((role_context.clone(), prompt.to_string()));
        let next = self.script.lock().await.pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
