use lazy_static::lazy_static;
use prometheus::{
    Histogram, IntCounterVec, IntGauge, register_histogram, register_int_counter_vec,
    register_int_gauge,
};

lazy_static! {
    // labels: action, outcome (allowed | limited)
    pub static ref RATE_LIMIT_DECISIONS: IntCounterVec = register_int_counter_vec!(
        "armie_rate_limit_decisions_total",
        "Rate limit decisions by action and outcome",
        &["action", "outcome"]
    )
    .expect("decision counter registers once");
    pub static ref TRACKED_KEYS: IntGauge = register_int_gauge!(
        "armie_rate_limit_tracked_keys",
        "Counters currently held by the rate limiter"
    )
    .expect("tracked keys gauge registers once");
    pub static ref UPSTREAM_ERRORS: IntCounterVec = register_int_counter_vec!(
        "armie_upstream_errors_total",
        "Failed upstream requests by action",
        &["action"]
    )
    .expect("upstream error counter registers once");
    pub static ref UPSTREAM_LATENCY: Histogram = register_histogram!(
        "armie_upstream_latency_seconds",
        "Upstream request latency in seconds"
    )
    .expect("latency histogram registers once");
}
