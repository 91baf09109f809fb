//! clipmind: turn videos into persistent, queryable multimodal memory
//!
//! Ingestion decomposes a video into transcripts, window captions and
//! dense caption events, stores every derived unit as a timestamped
//! artifact in SQLite alongside a full-text index and per-artifact
//! embeddings, and serves hybrid search and grounded question
//! answering over that store.

pub mod cascade;
pub mod chunk;
pub mod config;
pub mod error;
pub mod ingest;
pub mod media;
pub mod provider;
pub mod rag;
pub mod search;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{Error, Result};
