//! Two-tier agent memory.
//!
//! Every agent owns an [`AgentMemory`]: a short-term, append-only event log
//! plus a long-term vector store that only receives events judged significant
//! by a [`SignificancePolicy`].
//!
//! # Main types
//!
//! - [`AgentMemory`]: Short-term log + long-term store for one agent.
//! - [`Embedder`]: Trait for deterministic text embeddings.
//! - [`LocalEmbedding`]: Hash-based bag-of-words embedder, no external calls.
//! - [`VectorStore`]: Append-only similarity store.
//! - [`InMemoryVectorStore`] / [`FileVectorStore`]: Store implementations.
//! - [`SignificancePolicy`]: Promotion rules.

/// Embedding trait and local implementation.
pub mod embedding;
/// Agent-facing two-tier memory.
pub mod memory;
/// Promotion rules.
pub mod significance;
/// Vector store trait and implementations.
pub mod store;

pub use embedding::{cosine_similarity, Embedder, LocalEmbedding};
pub use memory::{AgentMemory, Recall};
pub use significance::SignificancePolicy;
pub use store::{FileVectorStore, InMemoryVectorStore, MemoryEntry, SearchResult, VectorStore};
