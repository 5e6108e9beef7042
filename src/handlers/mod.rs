mod health;
mod metrics;
mod protected;

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State, rejection::BytesRejection},
    http::{HeaderMap, Method, Uri},
    routing::{get, post},
};

use crate::policy::Action;
use crate::state::AppState;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use protected::{guard_and_forward, rate_limit_headers};

// Every protected action gets its own POST route
pub fn router(state: Arc<AppState>) -> Router {
    let mut app: Router<Arc<AppState>> = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler));

    for action in Action::ALL {
        app = app.route(
            action.path(),
            post(
                move |State(state): State<Arc<AppState>>,
                      method: Method,
                      uri: Uri,
                      headers: HeaderMap,
                      body: Result<Bytes, BytesRejection>| {
                    guard_and_forward(action, state, method, uri, headers, body)
                },
            ),
        );
    }

    let limit = state.max_body_bytes;
    app.layer(DefaultBodyLimit::max(limit)).with_state(state)
}
