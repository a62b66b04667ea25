//! hotwave library
//!
//! Fetches trending topics from dozens of platforms through a shared
//! pipeline: cache lookup, throttling, in-flight deduplication, retried
//! fetch, normalization and pagination. Exposed as a library so the
//! integration tests can exercise the pipeline directly.

pub mod cache;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod data;
pub mod error;
pub mod net;
pub mod retry;
pub mod service;
pub mod sources;
