//! tollgate node binary.
//!
//! - Strict YAML config (`tollgate.yaml` or the first argument)
//! - Boot policies deployed before the listener opens
//! - Ctrl-C drains every evaluator before exit

use std::net::SocketAddr;
use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use tollgate_node::{app_state::AppState, config, router};

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "tollgate-node failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "tollgate.yaml".to_string());
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg.node.listen.parse()?;

    let state = AppState::boot(cfg).await?;
    let app = router::build_router(state.clone());

    tracing::info!(%listen, policies = state.registry().len(), "tollgate-node starting");
    let listener = tokio::net::TcpListener::bind(listen).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;

    state.shutdown().await;
    Ok(())
}
