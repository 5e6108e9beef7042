use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser; // for cli
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use armie_gateway::config::{Args, LogFormat};
use armie_gateway::handlers::router;
use armie_gateway::policy::Action;
use armie_gateway::rate_limit::SweepMode;
use armie_gateway::state::AppState;

// this is main async function with tokio
#[tokio::main]
async fn main() -> ExitCode {
    // parse cli arguments
    let args = Args::parse();
    init_logging(&args);

    let state = match AppState::from_args(&args) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    if state.limiter.sweep_mode() == SweepMode::Background {
        state
            .limiter
            .spawn_sweeper(Duration::from_secs(args.sweep_interval));
    }

    info!(upstream = %state.upstream, "forwarding protected routes");
    for action in Action::ALL {
        info!(
            %action,
            path = action.path(),
            policy = %state.policies.get(action),
            "rate limit policy"
        );
    }

    let app = router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, %addr, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    info!("Gateway running on http://localhost:{}", args.port);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "server failed");
        return ExitCode::FAILURE;
    }

    info!("Gateway stopped");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// RUST_LOG wins over --log-level
fn init_logging(args: &Args) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    match args.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .init(),
    }
}
