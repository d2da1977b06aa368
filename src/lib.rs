pub mod app;
pub mod client;
pub mod config;
pub mod embedding;
pub mod ingest;
pub mod pipeline;
pub mod runtime;
pub mod server;
pub mod shared;
pub mod task;
pub mod tui;
