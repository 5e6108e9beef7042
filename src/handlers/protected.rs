use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::rejection::BytesRejection,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};

use crate::client::client_identifier;
use crate::error::GatewayError;
use crate::metrics::{RATE_LIMIT_DECISIONS, TRACKED_KEYS, UPSTREAM_ERRORS};
use crate::models::RateLimitedBody;
use crate::policy::Action;
use crate::rate_limit::Decision;
use crate::state::AppState;
use crate::upstream::forward;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

// Quota headers attached to every protected response
pub fn rate_limit_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(
        X_RATELIMIT_RESET,
        HeaderValue::from(decision.reset_time.timestamp()),
    );
}

fn rate_limited(decision: &Decision, now: DateTime<Utc>) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(RateLimitedBody::from(decision)),
    )
        .into_response();
    let headers = response.headers_mut();
    rate_limit_headers(headers, decision);
    headers.insert(
        header::RETRY_AFTER,
        HeaderValue::from(decision.retry_after(now)),
    );
    response
}

// Unreadable or oversized bodies are refused before any quota is spent
fn body_error(rejection: BytesRejection, max: usize) -> GatewayError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GatewayError::BodyTooLarge { max }
    } else {
        GatewayError::RequestBody {
            message: rejection.body_text(),
        }
    }
}

// Count the attempt against the action's quota, then forward it or answer 429
pub async fn guard_and_forward(
    action: Action,
    state: Arc<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => return body_error(rejection, state.max_body_bytes).into_response(),
    };

    let policy = state.policies.get(action);
    let client = client_identifier(&headers);
    let now = Utc::now();
    let decision = state.limiter.check_at(&client, action.as_str(), policy, now);
    TRACKED_KEYS.set(state.limiter.len() as i64);

    if !decision.success {
        RATE_LIMIT_DECISIONS
            .with_label_values(&[action.as_str(), "limited"])
            .inc();
        tracing::warn!(
            %action,
            %client,
            reset = %decision.reset_time,
            "rate limit exceeded"
        );
        return rate_limited(&decision, now);
    }

    RATE_LIMIT_DECISIONS
        .with_label_values(&[action.as_str(), "allowed"])
        .inc();
    tracing::debug!(%action, remaining = decision.remaining, "rate limit passed");

    let mut response = match forward(&state, method, &uri, &headers, body).await {
        Ok(response) => response,
        Err(e) => {
            UPSTREAM_ERRORS.with_label_values(&[action.as_str()]).inc();
            e.into_response()
        }
    };
    rate_limit_headers(response.headers_mut(), &decision);
    response
}
