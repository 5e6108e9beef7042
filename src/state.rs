use std::time::Duration;

use crate::config::Args;
use crate::error::ConfigError;
use crate::policy::Policies;
use crate::rate_limit::{RateLimiter, SweepMode};

// app's shared state
pub struct AppState {
    pub client: reqwest::Client,
    pub limiter: RateLimiter,
    pub policies: Policies,
    pub upstream: String, // ARMIE base url, no trailing slash
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let sweep = if args.sweep_interval == 0 {
            SweepMode::Inline
        } else {
            SweepMode::Background
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(args.upstream_timeout))
            .build()
            .map_err(|e| ConfigError::HttpClient {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            limiter: RateLimiter::new(sweep),
            policies: Policies::from_args(args)?,
            upstream: args.upstream_base(),
            max_body_bytes: args.max_body_bytes,
        })
    }
}
