//! Quorate gateway binary

use anyhow::Result;
use quorate_gateway::{build_app, GatewayConfig};
use tracing::{info, info_span};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = GatewayConfig::load()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("quorate_gateway=info,quorate_workflow=info,quorate_ledger=warn")
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(config.json_logs.then(|| fmt::layer().json()))
        .with((!config.json_logs).then(|| fmt::layer()))
        .init();

    info!("Starting Quorate gateway v{}", quorate_common::VERSION);
    info!(
        approval_mode = ?config.workflow.approval_mode,
        default_quorum = config.workflow.default_quorum,
        page_size = config.workflow.page_size,
        "Workflow configured"
    );

    let root = info_span!("quorate");
    let app = build_app(&config, &root)?;

    let addr = config.bind_addr();
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
