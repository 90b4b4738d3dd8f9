//! # docsift
//!
//! An ephemeral, session-scoped document retrieval store. Callers upload
//! ad-hoc documents into a short-lived session, the pipeline chunks and
//! embeds them into an in-memory vector index owned by that session, and
//! nearest-neighbor queries run against the session's index until its TTL
//! lapses. Nothing survives a restart by design.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────────┐   ┌─────────────────┐
//! │  Upload  │──▶│  Ingest pipeline       │──▶│  SessionStore    │
//! │ (HTTP)   │   │ quota→extract→chunk   │   │ per-session      │
//! └──────────┘   │ →embed→index          │   │ VectorIndex+TTL  │
//!                └───────────────────────┘   └──────┬──────────┘
//!                                                   │
//!                          ┌────────────────────────┤
//!                          ▼                        ▼
//!                    ┌───────────┐            ┌───────────┐
//!                    │ Retrieval │            │  Sweeper  │
//!                    │  (top-k)  │            │ (expiry)  │
//!                    └───────────┘            └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`extract`] | Uploaded-bytes to text |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Per-session vector index |
//! | [`quota`] | Per-user ingestion quota |
//! | [`session`] | Session store and TTL expiry |
//! | [`ingest`] | Ingestion pipeline |
//! | [`retrieve`] | Top-k retrieval |
//! | [`sweeper`] | Background expiry sweep |
//! | [`server`] | HTTP server |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod models;
pub mod quota;
pub mod retrieve;
pub mod server;
pub mod session;
pub mod sweeper;
