#![deny(missing_docs)]

//! Core library for the chatdoc server.

/// Document extraction, truncation, and summarization pipeline.
pub mod analysis;
/// HTTP routing and REST handlers.
pub mod api;
/// Chat relay handler logic.
pub mod chat;
/// Completion provider abstraction and adapters.
pub mod completion;
/// Environment-driven configuration management.
pub mod config;
/// Structured logging and tracing setup.
pub mod logging;
/// Assistant service shared by the HTTP handlers.
pub mod service;
