//! stagemeter demo host
//!
//! - Metrics endpoint: GET /metrics on `metrics.listen`
//! - Demo serving endpoint: POST /predict on `server.listen`
//! - Config: `stagemeter.yaml` (or `STAGEMETER_CONFIG`), defaults when absent

use std::path::Path;
use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use stagemeter_core::error::{Result, StagemeterError};
use stagemeter_core::stage::ServingStage;
use stagemeter_gateway::{
    config::{self, StagemeterConfig},
    demo::{DemoState, SimpleStage},
    router, MetricsRegistry, StageExt,
};

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, code = e.code().as_str(), "stagemeter-gateway failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let path = std::env::var("STAGEMETER_CONFIG").unwrap_or_else(|_| "stagemeter.yaml".into());
    let cfg = if Path::new(&path).exists() {
        config::load_from_file(&path)?
    } else {
        tracing::info!(%path, "config file not found, using defaults");
        let cfg = StagemeterConfig::default();
        cfg.validate()?;
        cfg
    };

    let metrics = MetricsRegistry::initialize(cfg.metrics.addr()?).await?;

    let mut stage = SimpleStage::new(metrics.accuracy_reporter()).instrumented(metrics);
    stage
        .setup("cpu")
        .map_err(|e| StagemeterError::Internal(format!("stage setup failed: {e}")))?;

    let listen = cfg.server.addr()?;
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| StagemeterError::Internal(format!("bind {listen} failed: {e}")))?;
    tracing::info!(%listen, stage = stage.name(), "stagemeter-gateway starting");

    let app = router::build_demo_router(DemoState::new(stage));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StagemeterError::Internal(format!("server failed: {e}")))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
