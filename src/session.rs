//! Session lifecycle: creation, TTL expiry, and the per-session guard.
//!
//! A [`Session`] exclusively owns one [`VectorIndex`] and the documents
//! indexed into it; no two sessions ever share an index. The index and
//! document list live behind a `tokio::sync::Mutex` — the per-session
//! exclusive guard that serializes ingestion mutations (and, because the
//! index is not read-safe during appends, retrieval reads as well). The
//! guard is an async mutex because ingestion holds it across embedding
//! awaits.
//!
//! The [`SessionStore`] owns the id→session map and checks TTL lazily on
//! every lookup; the background sweeper calls [`SessionStore::sweep`] to
//! reclaim sessions nobody touches again.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::error::{DocsiftError, Result};
use crate::index::{ChunkKey, VectorIndex};
use crate::models::{Chunk, Document, SessionStats};

/// The mutable per-session data protected by the exclusive guard.
#[derive(Debug)]
pub struct SessionState {
    pub index: VectorIndex,
    pub documents: Vec<Document>,
}

impl SessionState {
    fn new(dims: usize) -> Self {
        Self {
            index: VectorIndex::new(dims),
            documents: Vec::new(),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.documents.iter().map(|d| d.chunks.len()).sum()
    }

    /// Resolve an index entry's key back to its document and chunk.
    pub fn resolve(&self, key: ChunkKey) -> Option<(&Document, &Chunk)> {
        let doc = self.documents.get(key.0)?;
        let chunk = doc.chunks.get(key.1)?;
        Some((doc, chunk))
    }
}

#[derive(Debug, Clone, Copy)]
struct AccessStamp {
    instant: Instant,
    wall: DateTime<Utc>,
}

impl AccessStamp {
    fn now() -> Self {
        Self {
            instant: Instant::now(),
            wall: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    /// Monotonic stamp for TTL math plus a wall clock for reporting.
    last_access: StdMutex<AccessStamp>,
    /// The per-session exclusive guard.
    pub state: AsyncMutex<SessionState>,
}

impl Session {
    fn new(id: String, user_id: String, dims: usize) -> Self {
        Self {
            id,
            user_id,
            created_at: Utc::now(),
            last_access: StdMutex::new(AccessStamp::now()),
            state: AsyncMutex::new(SessionState::new(dims)),
        }
    }

    /// Refresh the last-access timestamp.
    pub fn touch(&self) {
        *self.last_access.lock().unwrap() = AccessStamp::now();
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.last_access.lock().unwrap().instant.elapsed() > ttl
    }

    pub fn last_access(&self) -> DateTime<Utc> {
        self.last_access.lock().unwrap().wall
    }
}

/// Owns the session-id → session mapping and enforces TTL expiry.
#[derive(Debug)]
pub struct SessionStore {
    sessions: StdMutex<HashMap<String, Arc<Session>>>,
    ttl: Duration,
    dims: usize,
}

impl SessionStore {
    pub fn new(ttl: Duration, dims: usize) -> Self {
        Self {
            sessions: StdMutex::new(HashMap::new()),
            ttl,
            dims,
        }
    }

    /// Resolve an existing live session or create a new one.
    ///
    /// A supplied id that is unknown or expired is `SessionNotFound` — dead
    /// ids are never resurrected, the caller must request a fresh session.
    pub fn get_or_create(
        &self,
        session_id: Option<&str>,
        user_id: &str,
    ) -> Result<Arc<Session>> {
        match session_id {
            Some(id) => self.get(id),
            None => {
                let id = Uuid::new_v4().to_string();
                let session = Arc::new(Session::new(id.clone(), user_id.to_string(), self.dims));
                self.sessions
                    .lock()
                    .unwrap()
                    .insert(id, Arc::clone(&session));
                tracing::info!(session_id = %session.id, user_id, "session created");
                Ok(session)
            }
        }
    }

    /// Look up a live session, refreshing its last-access timestamp. An
    /// expired session is evicted on the spot.
    pub fn get(&self, session_id: &str) -> Result<Arc<Session>> {
        let session = self.peek(session_id)?;
        session.touch();
        Ok(session)
    }

    /// Look up a live session without refreshing last-access. Expiry is
    /// still enforced; only ingestion and retrieval count as use, so
    /// read-only surfaces like stats go through here.
    pub fn peek(&self, session_id: &str) -> Result<Arc<Session>> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get(session_id) {
            Some(session) if !session.is_expired(self.ttl) => Ok(Arc::clone(session)),
            Some(_) => {
                sessions.remove(session_id);
                tracing::debug!(session_id, "expired session evicted on access");
                Err(DocsiftError::SessionNotFound {
                    session_id: session_id.to_string(),
                })
            }
            None => Err(DocsiftError::SessionNotFound {
                session_id: session_id.to_string(),
            }),
        }
    }

    /// Refresh last-access without returning the session.
    pub fn touch(&self, session_id: &str) -> Result<()> {
        self.get(session_id).map(|_| ())
    }

    /// Explicit early destruction. Returns whether a session was present;
    /// evicting an already-gone session is not an error.
    pub fn evict(&self, session_id: &str) -> bool {
        let removed = self.sessions.lock().unwrap().remove(session_id).is_some();
        if removed {
            tracing::info!(session_id, "session evicted");
        }
        removed
    }

    /// Read-only counts and timestamps for one session. Does not count as
    /// use: `last_access` is left untouched, so polling stats cannot keep a
    /// session alive.
    pub async fn stats(&self, session_id: &str) -> Result<SessionStats> {
        let session = self.peek(session_id)?;
        let state = session.state.lock().await;
        Ok(SessionStats {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            document_count: state.documents.len(),
            chunk_count: state.chunk_count(),
            created_at: session.created_at,
            last_access: session.last_access(),
        })
    }

    /// Drop every expired session. Returns how many were reclaimed.
    pub fn sweep(&self) -> usize {
        let mut sessions = self.sessions.lock().unwrap();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| s.is_expired(self.ttl))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            sessions.remove(id);
            tracing::info!(session_id = %id, "expired session swept");
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().unwrap().is_empty()
    }
}
