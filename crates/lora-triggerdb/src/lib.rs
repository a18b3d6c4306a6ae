//! Trigger-word database for a LoRA loader node: a JSON store keyed by
//! adapter file name, trigger extraction from adapter metadata, the load
//! orchestration that picks which triggers to emit, and the HTTP endpoints
//! the browser UI talks to.

pub mod config;
pub mod error;
pub mod http;
pub mod key;
pub mod loader;
pub mod logging;
pub mod metadata;
pub mod paths;
pub mod store;
