//! Core data models for the session retrieval store.
//!
//! These types represent the documents, chunks, and search results that flow
//! through the ingestion and retrieval pipeline. Everything here lives only
//! as long as its owning session.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A file as received from the upload endpoint, before extraction.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A document ingested into a session. Immutable once created.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    pub chunks: Vec<Chunk>,
}

/// A bounded-size, overlapping text segment derived from a document body.
/// The unit indexed for retrieval.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub document_id: String,
    /// Zero-based position within the owning document.
    pub chunk_index: usize,
    pub text: String,
    /// Byte offset of the segment start within the extracted text.
    pub start: usize,
    /// Byte offset one past the segment end.
    pub end: usize,
    /// SHA-256 of the chunk text.
    pub hash: String,
}

/// A raw text segment produced by the chunker, before it is tied to a
/// document record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFragment {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Source metadata attached to every search hit.
#[derive(Debug, Clone, Serialize)]
pub struct HitMetadata {
    pub document_id: String,
    pub filename: String,
    pub chunk_index: usize,
    pub start: usize,
    pub end: usize,
}

/// A ranked retrieval result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub metadata: HitMetadata,
    pub score: f32,
}

/// Outcome of one ingestion request.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub session_id: String,
    pub files_processed: usize,
    pub chunks_indexed: usize,
    pub quota_remaining: u32,
    /// Files that failed after quota was consumed (per-file best-effort).
    pub skipped: Vec<SkippedFile>,
}

/// A file that could not be processed, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub filename: String,
    pub reason: String,
}

/// Read-only session summary for `GET /sessions/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: String,
    pub user_id: String,
    pub document_count: usize,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
}
