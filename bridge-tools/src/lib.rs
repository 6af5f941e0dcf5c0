//! Tool catalog storage, ranking, and tool-source transport dispatch.
//!
//! The repository holds the authoritative set of registered manuals behind a
//! copy-on-write snapshot, search strategies rank its tools against free-text
//! queries (optionally blending in text embeddings), and the transport
//! registry maps call-template kinds to the integrations that actually reach
//! each tool source.

#![warn(missing_docs, clippy::pedantic)]

pub mod embedding;
pub mod repository;
pub mod search;
pub mod transport;
