//! Top-k retrieval against a session's vector index.
//!
//! Embeds the query as a single-item batch, then searches under the
//! session's guard. The guard is held only for the in-memory search, never
//! across the embedding await.

use std::sync::Arc;
use std::time::Duration;

use crate::config::RetrievalConfig;
use crate::embedding::Embedder;
use crate::error::{DocsiftError, Result};
use crate::models::{HitMetadata, SearchHit};
use crate::session::SessionStore;

pub struct RetrievalService {
    store: Arc<SessionStore>,
    embedder: Arc<dyn Embedder>,
    retrieval: RetrievalConfig,
    timeout: Duration,
}

impl RetrievalService {
    pub fn new(
        store: Arc<SessionStore>,
        embedder: Arc<dyn Embedder>,
        retrieval: RetrievalConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            embedder,
            retrieval,
            timeout,
        }
    }

    /// Search a session's index. `k` defaults when absent and is clamped to
    /// `[1, max_k]`. A live session with nothing indexed yields an empty
    /// list, not an error.
    pub async fn retrieve(
        &self,
        session_id: &str,
        query: &str,
        k: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        let deadline = self.timeout;
        tokio::time::timeout(deadline, self.retrieve_inner(session_id, query, k))
            .await
            .map_err(|_| DocsiftError::OperationTimedOut(deadline.as_secs()))?
    }

    async fn retrieve_inner(
        &self,
        session_id: &str,
        query: &str,
        k: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(DocsiftError::EmptyQuery);
        }
        let k = k
            .unwrap_or(self.retrieval.default_k)
            .clamp(1, self.retrieval.max_k);

        let session = self.store.get(session_id)?;
        let query_vec = self.embedder.embed_one(query).await?;

        let state = session.state.lock().await;
        let scored = state.index.search(&query_vec, k)?;

        let hits = scored
            .into_iter()
            .filter_map(|entry| {
                let (doc, chunk) = state.resolve(entry.chunk_key)?;
                Some(SearchHit {
                    text: chunk.text.clone(),
                    metadata: HitMetadata {
                        document_id: doc.id.clone(),
                        filename: doc.filename.clone(),
                        chunk_index: chunk.chunk_index,
                        start: chunk.start,
                        end: chunk.end,
                    },
                    score: entry.score,
                })
            })
            .collect();

        tracing::debug!(session_id, k, "query served");
        Ok(hits)
    }
}
