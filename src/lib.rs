//! archivist - hybrid multi-domain retrieval for RAG backends
//!
//! This crate provides:
//! - Document storage with domains (namespaces) and routing rules
//! - Incremental indexing driven by content-hash change detection
//! - Hybrid retrieval (vector + BM25) with RRF or weighted fusion,
//!   optional cross-encoder reranking, and cross-domain merging
//! - Query classification (keyword, LLM, hybrid) with chat-session
//!   domain inheritance and query rewriting
//! - A chat orchestrator with a multi-level retrieval degradation chain

pub mod chat;
pub mod chunk;
pub mod classify;
pub mod commands;
pub mod config;
pub mod embed;
pub mod error;
pub mod index;
pub mod llm;
pub mod progress;
pub mod rerank;
pub mod retrieval;
pub mod rewrite;
pub mod store;
pub mod telemetry;

pub use config::Config;
pub use error::{Error, Result};
