use std::time::Instant;

use axum::{
    body::Bytes,
    http::{HeaderMap, Method, Uri, header},
    response::{IntoResponse, Response},
};

use crate::error::GatewayError;
use crate::metrics::UPSTREAM_LATENCY;
use crate::state::AppState;

// Hop-by-hop headers never cross the gateway
const HOP_BY_HOP: [header::HeaderName; 8] = [
    header::CONNECTION,
    header::HOST,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
    header::PROXY_AUTHORIZATION,
];

pub fn end_to_end_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in HOP_BY_HOP.iter() {
        out.remove(name);
    }
    out.remove("keep-alive");
    out
}

// Same path and query on the upstream
pub fn upstream_url(base: &str, uri: &Uri) -> String {
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("{}{}", base, path)
}

// Replay a permitted request against the ARMIE app and relay its answer
pub async fn forward(
    state: &AppState,
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let url = upstream_url(&state.upstream, uri);
    let start_time = Instant::now();

    let res = state
        .client
        .request(method.clone(), &url)
        .headers(end_to_end_headers(headers))
        .body(body)
        .send()
        .await?;

    let status = res.status();
    let res_headers = end_to_end_headers(res.headers());
    let bytes = res.bytes().await.map_err(GatewayError::UpstreamBody)?;

    UPSTREAM_LATENCY.observe(start_time.elapsed().as_secs_f64());
    tracing::debug!(%method, %url, status = status.as_u16(), "upstream responded");

    Ok((status, res_headers, bytes).into_response())
}
