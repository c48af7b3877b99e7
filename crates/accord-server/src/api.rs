//! HTTP surface: thin JSON handlers over the workflow orchestrator. Wire
//! field names are camelCase throughout; errors come back as a single
//! `{"error": "..."}` envelope.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::warn;

use accord_core::Rfc;
use accord_github::{ListQuery, RequestState, ReviewKind};
use accord_workflow::{Orchestrator, ReviewInput, WorkflowError};

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/submitRequest", post(submit_request))
        .route("/updateRequest", post(update_request))
        .route("/reviewRequest", post(review_request))
        .route("/mergeRequest", post(merge_request))
        .route("/loadRequest", post(load_request))
        .route("/status", post(status))
        .route("/getRfcs", post(get_rfcs))
        .route("/getRfcContents", post(get_rfc_contents))
        .layer(TraceLayer::new_for_http())
        .with_state(orchestrator)
}

/// JSON body extractor whose rejection uses the service's error envelope.
struct ApiJson<T>(T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                warn!(error = %rejection, "rejected request body");
                Err((
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "error": "Malformed request received" })),
                )
                    .into_response())
            }
        }
    }
}

struct ApiError(WorkflowError);

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Client-correctable errors carry their message; everything else is
        // logged with full context and returned sanitized.
        let (code, message) = match &self.0 {
            WorkflowError::Validation(_) | WorkflowError::MalformedArtifact { .. } => {
                (StatusCode::BAD_REQUEST, self.0.to_string())
            }
            _ => {
                warn!(error = %self.0, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "the request could not be completed".to_string(),
                )
            }
        };
        (code, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentifierBody {
    rfc_identifier: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody {
    rfc_identifier: String,
    rfc: Rfc,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewBody {
    rfc_identifier: String,
    review_type: ReviewKind,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    comments: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    load_request: bool,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ListBody {
    #[serde(default)]
    state: RequestState,
    /// Negative or absent means no limit.
    #[serde(default)]
    count: Option<i64>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    merged: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdentifierResponse {
    rfc_identifier: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

#[derive(Serialize)]
struct BodyResponse {
    body: String,
}

#[derive(Serialize)]
struct StatusResponse {
    status: Option<String>,
}

#[derive(Serialize)]
struct RfcRow {
    identifier: String,
    title: String,
}

#[derive(Serialize)]
struct ListResponse {
    rfcs: Vec<RfcRow>,
    count: usize,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn submit_request(
    State(orchestrator): State<Arc<Orchestrator>>,
    ApiJson(rfc): ApiJson<Rfc>,
) -> Result<Json<IdentifierResponse>, ApiError> {
    let rfc_identifier = orchestrator.submit(rfc).await?;
    Ok(Json(IdentifierResponse { rfc_identifier }))
}

async fn update_request(
    State(orchestrator): State<Arc<Orchestrator>>,
    ApiJson(body): ApiJson<UpdateBody>,
) -> Result<Json<IdentifierResponse>, ApiError> {
    orchestrator.update(&body.rfc_identifier, body.rfc).await?;
    Ok(Json(IdentifierResponse {
        rfc_identifier: body.rfc_identifier,
    }))
}

async fn review_request(
    State(orchestrator): State<Arc<Orchestrator>>,
    ApiJson(body): ApiJson<ReviewBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = orchestrator
        .review(ReviewInput {
            identifier: body.rfc_identifier,
            kind: body.review_type,
            top_level_comment: body.comment,
            comments: body.comments,
            load_on_approval: body.load_request,
        })
        .await?;
    Ok(Json(MessageResponse { message }))
}

async fn merge_request(
    State(orchestrator): State<Arc<Orchestrator>>,
    ApiJson(body): ApiJson<IdentifierBody>,
) -> Result<Json<SuccessResponse>, ApiError> {
    orchestrator.merge(&body.rfc_identifier).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn load_request(
    State(orchestrator): State<Arc<Orchestrator>>,
    ApiJson(body): ApiJson<IdentifierBody>,
) -> Result<Json<StatusResponse>, ApiError> {
    orchestrator.request_load(&body.rfc_identifier).await?;
    Ok(Json(StatusResponse {
        status: Some(accord_core::LoadStatus::LoadRequested.to_string()),
    }))
}

async fn status(
    State(orchestrator): State<Arc<Orchestrator>>,
    ApiJson(body): ApiJson<IdentifierBody>,
) -> Result<Json<StatusResponse>, ApiError> {
    let status = orchestrator.status(&body.rfc_identifier).await?;
    Ok(Json(StatusResponse { status }))
}

async fn get_rfcs(
    State(orchestrator): State<Arc<Orchestrator>>,
    ApiJson(body): ApiJson<ListBody>,
) -> Result<Json<ListResponse>, ApiError> {
    let query = ListQuery {
        state: body.state,
        count: body.count.and_then(|n| usize::try_from(n).ok()),
        owner: body.owner,
        merged: body.merged,
    };
    let rfcs: Vec<RfcRow> = orchestrator
        .list(&query)
        .await?
        .into_iter()
        .map(|summary| RfcRow {
            identifier: summary.identifier,
            title: summary.title,
        })
        .collect();
    let count = rfcs.len();
    Ok(Json(ListResponse { rfcs, count }))
}

async fn get_rfc_contents(
    State(orchestrator): State<Arc<Orchestrator>>,
    ApiJson(body): ApiJson<IdentifierBody>,
) -> Result<Json<BodyResponse>, ApiError> {
    let body = orchestrator.contents(&body.rfc_identifier).await?;
    Ok(Json(BodyResponse { body }))
}
