//! Ingestion pipeline orchestration.
//!
//! Coordinates the full upload flow: quota check → session resolution →
//! text extraction → chunking → embedding → index append, all under the
//! session's exclusive guard so two concurrent uploads for one session
//! never interleave.
//!
//! Quota is consumed before any processing work, so a rejected batch costs
//! nothing; a failure after that point does not refund it. Extraction
//! failures skip just that file and the batch continues; an embedding
//! outage aborts the remainder of the batch (the whole call is safe to
//! retry), while files already committed stay indexed.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::chunk::split_text;
use crate::config::{ChunkingConfig, UploadConfig};
use crate::embedding::Embedder;
use crate::error::{DocsiftError, Result};
use crate::extract;
use crate::models::{Chunk, Document, IngestReport, SkippedFile, UploadedFile};
use crate::quota::QuotaTracker;
use crate::session::SessionStore;

pub struct IngestService {
    store: Arc<SessionStore>,
    quota: Arc<QuotaTracker>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    upload: UploadConfig,
    timeout: Duration,
}

impl IngestService {
    pub fn new(
        store: Arc<SessionStore>,
        quota: Arc<QuotaTracker>,
        embedder: Arc<dyn Embedder>,
        chunking: ChunkingConfig,
        upload: UploadConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            quota,
            embedder,
            chunking,
            upload,
            timeout,
        }
    }

    /// Ingest a batch of files into a session, creating the session when no
    /// id is supplied. See the module docs for the failure model.
    pub async fn ingest(
        &self,
        session_id: Option<&str>,
        user_id: &str,
        files: Vec<UploadedFile>,
    ) -> Result<IngestReport> {
        let deadline = self.timeout;
        tokio::time::timeout(deadline, self.ingest_inner(session_id, user_id, files))
            .await
            .map_err(|_| DocsiftError::OperationTimedOut(deadline.as_secs()))?
    }

    async fn ingest_inner(
        &self,
        session_id: Option<&str>,
        user_id: &str,
        files: Vec<UploadedFile>,
    ) -> Result<IngestReport> {
        self.validate_batch(&files)?;

        // Quota is consumed up front; no extraction or embedding work
        // happens for a rejected batch.
        if !self.quota.try_consume(user_id, files.len() as u32) {
            return Err(DocsiftError::QuotaExceeded {
                user_id: user_id.to_string(),
            });
        }

        let session = self.store.get_or_create(session_id, user_id)?;
        let mut state = session.state.lock().await;

        let mut files_processed = 0usize;
        let mut chunks_indexed = 0usize;
        let mut skipped = Vec::new();

        for mut file in files {
            // PDF parsing and DOCX inflation are CPU-bound; run them on the
            // blocking pool so this task never stalls the executor while it
            // holds the session guard.
            let bytes = std::mem::take(&mut file.bytes);
            let filename = file.filename.clone();
            let extracted =
                tokio::task::spawn_blocking(move || extract::extract_text(&filename, &bytes))
                    .await;
            let text = match extracted {
                Ok(Ok(t)) => t,
                Ok(Err(e)) => {
                    tracing::warn!(filename = %file.filename, error = %e, "file skipped");
                    skipped.push(SkippedFile {
                        filename: file.filename.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
                Err(e) => {
                    tracing::warn!(filename = %file.filename, error = %e, "extraction task failed");
                    skipped.push(SkippedFile {
                        filename: file.filename.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let fragments = split_text(&text, self.chunking.max_chars, self.chunking.overlap_chars);
            if fragments.is_empty() {
                skipped.push(SkippedFile {
                    filename: file.filename.clone(),
                    reason: "no extractable text".to_string(),
                });
                continue;
            }

            // One embedding batch per file: the file's chunks are indexed
            // all together or not at all.
            let texts: Vec<String> = fragments.iter().map(|f| f.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;

            let doc_id = Uuid::new_v4().to_string();
            let doc_pos = state.documents.len();
            let mut chunks = Vec::with_capacity(fragments.len());

            for (i, (fragment, vector)) in fragments.iter().zip(vectors).enumerate() {
                state.index.add(vector, (doc_pos, i))?;
                chunks.push(Chunk {
                    document_id: doc_id.clone(),
                    chunk_index: i,
                    text: fragment.text.clone(),
                    start: fragment.start,
                    end: fragment.end,
                    hash: sha256_hex(&fragment.text),
                });
            }

            chunks_indexed += chunks.len();
            files_processed += 1;

            state.documents.push(Document {
                id: doc_id,
                filename: file.filename.clone(),
                content_type: file.content_type.clone(),
                created_at: chrono::Utc::now(),
                chunks,
            });
        }

        session.touch();

        tracing::info!(
            session_id = %session.id,
            user_id,
            files_processed,
            chunks_indexed,
            skipped = skipped.len(),
            "ingestion complete"
        );

        Ok(IngestReport {
            session_id: session.id.clone(),
            files_processed,
            chunks_indexed,
            quota_remaining: self.quota.remaining(user_id),
            skipped,
        })
    }

    /// Shape checks that run before quota consumption: these rejections are
    /// free for the user.
    fn validate_batch(&self, files: &[UploadedFile]) -> Result<()> {
        if files.is_empty() {
            return Err(DocsiftError::NoFiles);
        }
        if files.len() > self.upload.max_files_per_request {
            return Err(DocsiftError::TooManyFiles {
                count: files.len(),
                limit: self.upload.max_files_per_request,
            });
        }
        for file in files {
            if file.bytes.len() > self.upload.max_file_bytes {
                return Err(DocsiftError::FileTooLarge {
                    filename: file.filename.clone(),
                    limit: self.upload.max_file_bytes,
                });
            }
            let allowed = extract::extension(&file.filename)
                .map(|ext| self.upload.allowed_extensions.contains(&ext))
                .unwrap_or(false);
            if !allowed {
                return Err(DocsiftError::UnsupportedExtension {
                    filename: file.filename.clone(),
                });
            }
        }
        Ok(())
    }
}

fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkingConfig, UploadConfig};
    use crate::embedding::HashingEmbedder;

    fn service(ceiling: u32) -> IngestService {
        let store = Arc::new(SessionStore::new(Duration::from_secs(60), 64));
        let quota = Arc::new(QuotaTracker::new(ceiling, Duration::from_secs(60)));
        IngestService::new(
            store,
            quota,
            Arc::new(HashingEmbedder::new(64)),
            ChunkingConfig {
                max_chars: 200,
                overlap_chars: 20,
            },
            UploadConfig::default(),
            Duration::from_secs(30),
        )
    }

    fn txt(filename: &str, body: &str) -> UploadedFile {
        UploadedFile {
            filename: filename.to_string(),
            content_type: "text/plain".to_string(),
            bytes: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn ingest_creates_session_and_indexes_chunks() {
        let service = service(10);
        let report = service
            .ingest(None, "user-a", vec![txt("a.txt", "hello retrieval world")])
            .await
            .unwrap();
        assert_eq!(report.files_processed, 1);
        assert!(report.chunks_indexed >= 1);
        assert!(report.skipped.is_empty());
        assert_eq!(report.quota_remaining, 9);
        assert!(!report.session_id.is_empty());
    }

    #[tokio::test]
    async fn empty_batch_is_rejected_before_quota() {
        let service = service(10);
        let err = service.ingest(None, "user-a", vec![]).await.unwrap_err();
        assert!(matches!(err, DocsiftError::NoFiles));
        assert_eq!(service.quota.remaining("user-a"), 10);
    }

    #[tokio::test]
    async fn oversized_batch_costs_no_quota() {
        let service = service(10);
        let files: Vec<_> = (0..6).map(|i| txt(&format!("{i}.txt"), "body")).collect();
        let err = service.ingest(None, "user-a", files).await.unwrap_err();
        assert!(matches!(err, DocsiftError::TooManyFiles { .. }));
        assert_eq!(service.quota.remaining("user-a"), 10);
    }

    #[tokio::test]
    async fn disallowed_extension_costs_no_quota() {
        let service = service(10);
        let err = service
            .ingest(None, "user-a", vec![txt("evil.exe", "MZ")])
            .await
            .unwrap_err();
        assert!(matches!(err, DocsiftError::UnsupportedExtension { .. }));
        assert_eq!(service.quota.remaining("user-a"), 10);
    }

    #[tokio::test]
    async fn quota_exhaustion_rejects_whole_batch() {
        let service = service(2);
        service
            .ingest(None, "user-a", vec![txt("a.txt", "one")])
            .await
            .unwrap();
        let err = service
            .ingest(None, "user-a", vec![txt("b.txt", "two"), txt("c.txt", "three")])
            .await
            .unwrap_err();
        assert!(matches!(err, DocsiftError::QuotaExceeded { .. }));
    }

    #[tokio::test]
    async fn broken_file_is_skipped_and_quota_not_refunded() {
        let service = service(10);
        let broken = UploadedFile {
            filename: "broken.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: b"not a pdf".to_vec(),
        };
        let report = service
            .ingest(None, "user-a", vec![broken, txt("ok.txt", "good content here")])
            .await
            .unwrap();
        assert_eq!(report.files_processed, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].filename, "broken.pdf");
        // Both files were charged.
        assert_eq!(report.quota_remaining, 8);
    }

    #[tokio::test]
    async fn mixed_batch_keeps_document_order_across_extraction() {
        let service = service(10);
        let broken = UploadedFile {
            filename: "mid.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: b"not a pdf".to_vec(),
        };
        let report = service
            .ingest(
                None,
                "user-a",
                vec![
                    txt("first.txt", "alpha document body"),
                    broken,
                    txt("last.txt", "omega document body"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(report.files_processed, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].filename, "mid.pdf");

        let session = service.store.get(&report.session_id).unwrap();
        let state = session.state.lock().await;
        let names: Vec<_> = state.documents.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["first.txt", "last.txt"]);
    }

    #[tokio::test]
    async fn supplied_session_id_appends_to_same_index() {
        let service = service(10);
        let first = service
            .ingest(None, "user-a", vec![txt("a.txt", "first document")])
            .await
            .unwrap();
        let second = service
            .ingest(
                Some(&first.session_id),
                "user-a",
                vec![txt("b.txt", "second document")],
            )
            .await
            .unwrap();
        assert_eq!(first.session_id, second.session_id);

        let stats = service.store.stats(&first.session_id).await.unwrap();
        assert_eq!(stats.document_count, 2);
    }

    #[tokio::test]
    async fn stale_session_id_is_an_error() {
        let service = service(10);
        let err = service
            .ingest(Some("gone"), "user-a", vec![txt("a.txt", "body")])
            .await
            .unwrap_err();
        assert!(matches!(err, DocsiftError::SessionNotFound { .. }));
        // Quota was already consumed; deliberately not refunded.
        assert_eq!(service.quota.remaining("user-a"), 9);
    }
}
