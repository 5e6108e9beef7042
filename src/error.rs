use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

// Invalid policy values coming from the command line
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("rate limit for '{action}' must be at least 1")]
    ZeroLimit { action: String },

    #[error("rate window for '{action}' must be at least 1 second")]
    ZeroWindow { action: String },

    #[error("rate window for '{action}' is {seconds}s, maximum is {max}s")]
    WindowTooLong { action: String, seconds: u64, max: u64 },

    #[error("failed to build upstream http client: {message}")]
    HttpClient { message: String },
}

// Failures while serving a request
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("failed to read upstream response body: {0}")]
    UpstreamBody(reqwest::Error),

    #[error("request body exceeds {max} bytes")]
    BodyTooLarge { max: usize },

    #[error("invalid request body: {message}")]
    RequestBody { message: String },

    #[error("failed to encode metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Upstream(_) | GatewayError::UpstreamBody(_) => StatusCode::BAD_GATEWAY,
            GatewayError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::RequestBody { .. } => StatusCode::BAD_REQUEST,
            GatewayError::Metrics(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
