pub mod config;
pub mod constants;
pub mod error;
pub mod identifier;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod types;

// Application layer and the adapters behind its ports
pub mod app;
pub mod infra;
