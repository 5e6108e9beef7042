use clap::{Parser, ValueEnum};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "armie-gateway")]
#[command(about = "Rate limiting gateway in front of the ARMIE web app")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // ARMIE app base url, permitted requests are forwarded here
    #[arg(short, long, default_value = "http://localhost:3000")]
    pub upstream: String,

    // Upstream request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub upstream_timeout: u64,

    // Largest request body forwarded, in bytes (uploads included)
    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    pub max_body_bytes: usize,

    // Log level, RUST_LOG takes precedence when set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    // Seconds between background sweeps of expired counters
    // 0 sweeps on every request instead
    #[arg(long, default_value_t = 0)]
    pub sweep_interval: u64,

    // Sign-in: max attempts per window
    #[arg(long, default_value_t = 5)]
    pub signin_limit: u32,

    // Sign-in window in seconds
    #[arg(long, default_value_t = 900)]
    pub signin_window: u64,

    #[arg(long, default_value_t = 3)]
    pub signup_limit: u32,

    #[arg(long, default_value_t = 3600)]
    pub signup_window: u64,

    #[arg(long, default_value_t = 5)]
    pub assistant_limit: u32,

    #[arg(long, default_value_t = 3600)]
    pub assistant_window: u64,

    #[arg(long, default_value_t = 10)]
    pub contract_limit: u32,

    #[arg(long, default_value_t = 3600)]
    pub contract_window: u64,

    #[arg(long, default_value_t = 20)]
    pub upload_limit: u32,

    #[arg(long, default_value_t = 3600)]
    pub upload_window: u64,
}

impl Args {
    // Trailing slash stripped so paths can be appended
    pub fn upstream_base(&self) -> String {
        let base = self.upstream.trim().trim_end_matches('/');
        if base.starts_with("http") {
            base.to_string()
        } else {
            format!("http://{}", base)
        }
    }
}
