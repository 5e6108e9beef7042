pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod policy;
pub mod rate_limit;
pub mod state;
pub mod upstream;
