pub mod adapters;
pub mod app_state;
pub mod cache;
pub mod circuit_breaker;
pub mod concurrency;
pub mod config;
pub mod metadata;
pub mod resolver;
pub mod server;
pub mod stream;
pub mod stream_link;
pub mod tracing;
