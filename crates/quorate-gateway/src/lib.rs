//! # Quorate Gateway
//!
//! HTTP front end for the approval workflow. Holds a single in-process
//! ledger; every request runs as its own unit of work.

pub mod config;
pub mod routes;

use std::sync::Arc;

use quorate_ledger::Ledger;
use quorate_workflow::ApprovalWorkflow;
use tracing::Span;

pub use config::GatewayConfig;
pub use routes::{router, AppState};

/// Build the application router over a fresh in-memory ledger
pub fn build_app(config: &GatewayConfig, parent: &Span) -> anyhow::Result<axum::Router> {
    let workflow = ApprovalWorkflow::new(Ledger::in_memory(), config.workflow.clone(), parent)?;
    Ok(router(AppState::new(Arc::new(workflow))))
}
