use serde::{Deserialize, Serialize};

use crate::rate_limit::Decision;

pub const RATE_LIMITED_MESSAGE: &str = "Too many attempts. Please try again later.";

// 429 response body
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RateLimitedBody {
    pub error: String,
    pub limit: u32,
    pub remaining: u32,
    // unix seconds
    pub reset: i64,
}

impl From<&Decision> for RateLimitedBody {
    fn from(decision: &Decision) -> Self {
        Self {
            error: RATE_LIMITED_MESSAGE.to_string(),
            limit: decision.limit,
            remaining: decision.remaining,
            reset: decision.reset_time.timestamp(),
        }
    }
}

// /health response body
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub tracked_keys: usize,
}
