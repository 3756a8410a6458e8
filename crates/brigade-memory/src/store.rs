use crate::embedding::cosine_similarity;
use brigade_core::{BrigadeError, BrigadeResult, Event};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::RwLock;

/// A promoted event together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// The event as it was appended to short-term memory.
    pub event: Event,
    /// Embedding of `event.content`.
    pub embedding: Vec<f32>,
}

/// Result of a similarity query.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matching entry.
    pub entry: MemoryEntry,
    /// Cosine similarity to the query.
    pub score: f32,
}

/// Append-only storage for long-term memory.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append an entry.
    async fn insert(&self, entry: MemoryEntry) -> BrigadeResult<()>;

    /// Top-k entries by cosine similarity, descending. Equal scores keep
    /// insertion order. An empty store yields an empty vector.
    async fn search(&self, query_embedding: &[f32], top_k: usize)
        -> BrigadeResult<Vec<SearchResult>>;

    /// All entries in insertion order.
    async fn list(&self) -> BrigadeResult<Vec<MemoryEntry>>;

    /// Number of entries.
    async fn count(&self) -> BrigadeResult<usize>;
}

/// In-memory store using brute-force cosine similarity.
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<MemoryEntry>>,
}

impl InMemoryVectorStore {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert(&self, entry: MemoryEntry) -> BrigadeResult<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> BrigadeResult<Vec<SearchResult>> {
        let entries = self.entries.read().await;
        if entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if query_embedding.is_empty() {
            return Err(BrigadeError::TaskFailed(
                "empty query embedding".to_string(),
            ));
        }

        let mut scored: Vec<SearchResult> = entries
            .iter()
            .map(|e| SearchResult {
                score: cosine_similarity(query_embedding, &e.embedding),
                entry: e.clone(),
            })
            .collect();

        // sort_by is stable, so ties stay in insertion order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);

        Ok(scored)
    }

    async fn list(&self) -> BrigadeResult<Vec<MemoryEntry>> {
        Ok(self.entries.read().await.clone())
    }

    async fn count(&self) -> BrigadeResult<usize> {
        Ok(self.entries.read().await.len())
    }
}

/// File-backed store that persists entries as JSONL.
/// Loads everything on open and appends on insert; the file is never rewritten.
pub struct FileVectorStore {
    path: PathBuf,
    inner: InMemoryVectorStore,
}

impl FileVectorStore {
    /// Open the store at `path`, loading existing entries if the file exists.
    pub async fn open(path: PathBuf) -> BrigadeResult<Self> {
        let inner = InMemoryVectorStore::new();

        if path.exists() {
            let data = tokio::fs::read_to_string(&path).await?;
            for (n, line) in data.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let entry: MemoryEntry = serde_json::from_str(line).map_err(|e| {
                    BrigadeError::TaskFailed(format!(
                        "invalid memory entry at {}:{}: {e}",
                        path.display(),
                        n + 1
                    ))
                })?;
                inner.insert(entry).await?;
            }
        } else if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        Ok(Self { path, inner })
    }

    async fn append_to_file(&self, entry: &MemoryEntry) -> BrigadeResult<()> {
        use tokio::io::AsyncWriteExt;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for FileVectorStore {
    async fn insert(&self, entry: MemoryEntry) -> BrigadeResult<()> {
        self.append_to_file(&entry).await?;
        self.inner.insert(entry).await
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> BrigadeResult<Vec<SearchResult>> {
        self.inner.search(query_embedding, top_k).await
    }

    async fn list(&self) -> BrigadeResult<Vec<MemoryEntry>> {
        self.inner.list().await
    }

    async fn count(&self) -> BrigadeResult<usize> {
        self.inner.count().await
    }
}
