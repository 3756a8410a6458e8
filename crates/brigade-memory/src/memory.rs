use crate::embedding::Embedder;
use crate::significance::SignificancePolicy;
use crate::store::{InMemoryVectorStore, MemoryEntry, VectorStore};
use brigade_core::{BrigadeResult, Event, EventKind};
use std::sync::Arc;
use tracing::warn;

/// An event recalled from long-term memory.
#[derive(Debug, Clone)]
pub struct Recall {
    /// The stored event.
    pub event: Event,
    /// Cosine similarity to the query.
    pub similarity: f32,
}

/// Two-tier memory owned by a single agent.
///
/// Short-term memory is the append-only log of every event, in execution
/// order. Events that pass the [`SignificancePolicy`] are also embedded and
/// appended to the long-term [`VectorStore`].
pub struct AgentMemory {
    short_term: Vec<Event>,
    long_term: Box<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    policy: SignificancePolicy,
}

impl AgentMemory {
    /// Memory backed by an in-memory long-term store.
    pub fn new(embedder: Arc<dyn Embedder>, policy: SignificancePolicy) -> Self {
        Self::with_store(Box::new(InMemoryVectorStore::new()), embedder, policy)
    }

    /// Memory backed by the given long-term store.
    pub fn with_store(
        long_term: Box<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        policy: SignificancePolicy,
    ) -> Self {
        Self {
            short_term: Vec::new(),
            long_term,
            embedder,
            policy,
        }
    }

    /// Append an event. Never fails; returns whether the event was promoted
    /// to long-term memory. Promotion errors are logged and swallowed.
    pub async fn add(&mut self, event: Event) -> bool {
        let promote = self.policy.is_significant(&event);
        self.short_term.push(event.clone());
        if !promote {
            return false;
        }
        match self.promote(event).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to promote event to long-term memory");
                false
            }
        }
    }

    async fn promote(&self, event: Event) -> BrigadeResult<()> {
        let embedding = self.embedder.embed(&event.content).await?;
        self.long_term.insert(MemoryEntry { event, embedding }).await
    }

    /// Top-k long-term events most similar to `query`.
    pub async fn query(&self, query: &str, k: usize) -> BrigadeResult<Vec<Recall>> {
        if k == 0 || self.long_term.count().await? == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed(query).await?;
        let results = self.long_term.search(&embedding, k).await?;
        Ok(results
            .into_iter()
            .map(|r| Recall {
                event: r.entry.event,
                similarity: r.score,
            })
            .collect())
    }

    /// The `n` most recent short-term events, oldest first.
    pub fn recent(&self, n: usize) -> &[Event] {
        let start = self.short_term.len().saturating_sub(n);
        &self.short_term[start..]
    }

    /// Number of short-term events.
    pub fn len(&self) -> usize {
        self.short_term.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.short_term.is_empty()
    }

    /// Number of long-term entries.
    pub async fn long_term_len(&self) -> BrigadeResult<usize> {
        self.long_term.count().await
    }

    /// Whether long-term memory holds a completion of `task_type`.
    ///
    /// Looks at the `lookback` entries most similar to
    /// `"task_completion <task_type>"` and matches on the `task_type` metadata.
    pub async fn has_completed(&self, task_type: &str, lookback: usize) -> BrigadeResult<bool> {
        let hits = self
            .query(&format!("task_completion {task_type}"), lookback)
            .await?;
        Ok(hits.iter().any(|r| {
            r.event.kind == EventKind::TaskCompletion
                && r.event.meta_str("task_type") == Some(task_type)
        }))
    }
}
