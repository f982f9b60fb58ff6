//! HTTP surface
//!
//! `POST /invoke` forwards `{function, args}` to the dispatcher. A handful of
//! REST routes cover the common paths directly.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use quorate_common::{Approval, ErrorKind, Proposal, QuorateError};
use quorate_ledger::Page;
use quorate_workflow::{
    ApprovalRequest, ApprovalWorkflow, Dispatcher, ProposalRequest, QuorumStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::debug;

#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<ApprovalWorkflow>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(workflow: Arc<ApprovalWorkflow>) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(Arc::clone(&workflow))),
            workflow,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub function: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub bookmark: String,
    pub page_size: Option<usize>,
}

/// HTTP status for an error category
pub fn http_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::DuplicateApproval | ErrorKind::ProposalRejected => StatusCode::CONFLICT,
        ErrorKind::SignatureInvalid => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::IdentityInactive => StatusCode::FORBIDDEN,
        ErrorKind::QuorumNotMet => StatusCode::PRECONDITION_FAILED,
        ErrorKind::StorageError => StatusCode::INTERNAL_SERVER_ERROR,
        // Safe to resend as-is
        ErrorKind::ConflictRetry => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Workflow error rendered as a JSON body
pub struct ApiError(QuorateError);

impl From<QuorateError> for ApiError {
    fn from(err: QuorateError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let body = Json(json!({
            "code": kind.code(),
            "message": self.0.to_string(),
            "retryable": self.0.is_retryable(),
        }));
        (http_status(kind), body).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/invoke", post(invoke))
        .route("/proposals", get(list_proposals).post(create_proposal))
        .route("/proposals/:proposal_id", get(get_proposal))
        .route("/proposals/:proposal_id/commit", post(commit_proposal))
        .route("/proposals/:proposal_id/quorum", get(quorum_status))
        .route("/proposals/:proposal_id/approvals", get(proposal_approvals))
        .route("/approvals", post(create_approval))
        .route("/approvers/:approver_id/pending", get(pending_proposals))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": quorate_common::VERSION,
    }))
}

async fn invoke(
    State(state): State<AppState>,
    Json(request): Json<InvokeRequest>,
) -> impl IntoResponse {
    debug!(function = %request.function, args = request.args.len(), "Invoke");
    let response = state
        .dispatcher
        .invoke(&request.function, &request.args)
        .await;
    let status = response.kind.map(http_status).unwrap_or(StatusCode::OK);
    (status, Json(response))
}

async fn create_proposal(
    State(state): State<AppState>,
    Json(request): Json<ProposalRequest>,
) -> Result<(StatusCode, Json<Proposal>), ApiError> {
    let proposal = state.workflow.submit_proposal(request).await?;
    Ok((StatusCode::CREATED, Json(proposal)))
}

async fn list_proposals(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Page<Proposal>> {
    let page = state
        .workflow
        .list_proposals(params.page_size, &params.bookmark)
        .await?;
    Ok(Json(page))
}

async fn get_proposal(
    State(state): State<AppState>,
    Path(proposal_id): Path<String>,
) -> ApiResult<Proposal> {
    Ok(Json(state.workflow.get_proposal(&proposal_id).await?))
}

async fn commit_proposal(
    State(state): State<AppState>,
    Path(proposal_id): Path<String>,
) -> ApiResult<Proposal> {
    Ok(Json(state.workflow.commit_proposal(&proposal_id).await?))
}

async fn quorum_status(
    State(state): State<AppState>,
    Path(proposal_id): Path<String>,
) -> ApiResult<QuorumStatus> {
    Ok(Json(state.workflow.quorum_status(&proposal_id).await?))
}

async fn proposal_approvals(
    State(state): State<AppState>,
    Path(proposal_id): Path<String>,
) -> ApiResult<Vec<Approval>> {
    Ok(Json(
        state.workflow.approvals_for_proposal(&proposal_id).await?,
    ))
}

async fn create_approval(
    State(state): State<AppState>,
    Json(request): Json<ApprovalRequest>,
) -> Result<(StatusCode, Json<Approval>), ApiError> {
    let approval = state.workflow.submit_approval(request).await?;
    Ok((StatusCode::CREATED, Json(approval)))
}

async fn pending_proposals(
    State(state): State<AppState>,
    Path(approver_id): Path<String>,
) -> ApiResult<Vec<Proposal>> {
    Ok(Json(state.workflow.pending_proposals_for(&approver_id).await?))
}
