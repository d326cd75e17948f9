//! HTTP route handlers for the reference studio API.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::generation::attachments::DisplayHandle;
use crate::generation::conversation::GenerationStats;
use crate::generation::core::ids::{BlobId, JobId, MessageId, ProjectId};
use crate::generation::core::job::GenerationJob;
use crate::generation::core::message::Message;
use crate::generation::core::settings::DetailedSettings;
use crate::generation::preferences::ReviewMode;
use crate::generation::service::AttachmentPayload;
use crate::generation::session::{PendingGeneration, SessionSnapshot, SubmitRefusal};

use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/session", get(session_snapshot))
        .route("/api/session/settings", put(update_settings))
        .route(
            "/api/session/selections/{category}",
            put(select_option).delete(deselect_option),
        )
        .route("/api/session/project", put(update_project))
        .route("/api/generate", post(generate))
        .route("/api/cancel", post(cancel))
        .route("/api/regenerate/{message_id}", post(regenerate))
        .route(
            "/api/conversation",
            get(conversation).delete(clear_conversation),
        )
        .route("/api/queue", get(queue))
        .route("/api/stats", get(stats))
        .route(
            "/api/attachments",
            post(add_attachments).delete(clear_attachments),
        )
        .route("/api/attachments/{index}", delete(remove_attachment))
        .route("/api/blobs/{id}", get(blob))
        .route(
            "/api/preferences/review-mode",
            get(review_mode).put(update_review_mode),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "reference-studio",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn session_snapshot(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<DetailedSettings>,
) -> Json<DetailedSettings> {
    Json(state.session.set_settings(settings))
}

/// Body of `PUT /api/session/selections/{category}`.
#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    /// Chosen option.
    pub value: String,
}

async fn select_option(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Json(request): Json<SelectionRequest>,
) -> StatusCode {
    state.session.select_option(category, request.value);
    StatusCode::NO_CONTENT
}

async fn deselect_option(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> StatusCode {
    state.session.deselect(&category);
    StatusCode::NO_CONTENT
}

/// Body of `PUT /api/session/project`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequest {
    /// Project to select; `null` unselects.
    pub project_id: Option<ProjectId>,
}

async fn update_project(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ProjectRequest>,
) -> StatusCode {
    state.session.set_project(request.project_id);
    StatusCode::NO_CONTENT
}

/// Body of `POST /api/generate`.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Prompt text.
    pub text: String,
}

/// Accepted submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    /// Job started for the submission.
    pub job_id: JobId,
}

const fn refusal_status(refusal: &SubmitRefusal) -> StatusCode {
    match refusal {
        SubmitRefusal::Busy => StatusCode::CONFLICT,
        SubmitRefusal::UnknownMessage => StatusCode::NOT_FOUND,
        SubmitRefusal::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        SubmitRefusal::EmptyPrompt
        | SubmitRefusal::InvalidPrompt { .. }
        | SubmitRefusal::NoProject => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

/// Run the job in the background and answer with its id.
fn accept(started: Result<PendingGeneration, SubmitRefusal>) -> Response {
    match started {
        Ok(pending) => {
            let job_id = pending.job_id();
            tokio::spawn(pending.run());
            (StatusCode::ACCEPTED, Json(GenerateResponse { job_id })).into_response()
        }
        Err(refusal) => (refusal_status(&refusal), Json(refusal)).into_response(),
    }
}

async fn generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    accept(state.session.begin(&request.text))
}

async fn regenerate(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<MessageId>,
) -> Response {
    accept(state.session.begin_regenerate(message_id))
}

async fn cancel(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let cancelled = state.session.cancel();
    Json(serde_json::json!({ "cancelled": cancelled }))
}

async fn conversation(State(state): State<Arc<AppState>>) -> Json<Vec<Message>> {
    Json(state.session.conversation())
}

/// Query of `DELETE /api/conversation`.
#[derive(Debug, Default, Deserialize)]
pub struct ClearQuery {
    /// Also drop statistics history.
    #[serde(default)]
    pub history: bool,
}

async fn clear_conversation(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ClearQuery>,
) -> StatusCode {
    state.session.clear(query.history);
    StatusCode::NO_CONTENT
}

async fn queue(State(state): State<Arc<AppState>>) -> Json<Vec<GenerationJob>> {
    Json(state.session.generation_queue())
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<GenerationStats> {
    Json(state.session.get_stats())
}

/// One uploaded file, base64 encoded.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Original file name.
    pub file_name: String,
    /// MIME type.
    pub mime_type: String,
    /// Base64 file contents.
    pub data: String,
    /// Where the file is already displayed from, for reused references.
    #[serde(default)]
    pub hosted_url: Option<String>,
}

/// Body of `POST /api/attachments`.
#[derive(Debug, Deserialize)]
pub struct AttachmentUpload {
    /// Files to stage.
    pub files: Vec<UploadedFile>,
}

async fn add_attachments(
    State(state): State<Arc<AppState>>,
    Json(upload): Json<AttachmentUpload>,
) -> Result<Json<Vec<DisplayHandle>>, (StatusCode, String)> {
    let files = upload
        .files
        .into_iter()
        .map(|file| {
            let bytes = STANDARD.decode(file.data.as_bytes()).map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("Invalid base64 in {}: {e}", file.file_name),
                )
            })?;
            let payload = AttachmentPayload {
                file_name: file.file_name,
                mime_type: file.mime_type,
                bytes,
            };
            Ok((file.hosted_url, payload))
        })
        .collect::<Result<Vec<_>, (StatusCode, String)>>()?;

    let mut handles = Vec::with_capacity(files.len());
    for (hosted_url, payload) in files {
        match hosted_url {
            Some(url) => handles.extend(state.session.add_hosted_attachment(url, payload)),
            None => handles.extend(state.session.add_attachments(vec![payload])),
        }
    }
    Ok(Json(handles))
}

async fn remove_attachment(
    State(state): State<Arc<AppState>>,
    Path(index): Path<i64>,
) -> Json<serde_json::Value> {
    let removed = usize::try_from(index).is_ok_and(|position| state.session.remove_attachment(position));
    Json(serde_json::json!({ "removed": removed }))
}

async fn clear_attachments(State(state): State<Arc<AppState>>) -> StatusCode {
    state.session.clear_attachments();
    StatusCode::NO_CONTENT
}

async fn blob(State(state): State<Arc<AppState>>, Path(id): Path<BlobId>) -> Response {
    match state.session.arena().resolve(id) {
        Some((mime_type, bytes)) => {
            ([(header::CONTENT_TYPE, mime_type)], bytes.to_vec()).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Review-mode preference payload.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewModeBody {
    /// Current mode.
    pub review_mode: ReviewMode,
}

async fn review_mode(State(state): State<Arc<AppState>>) -> Json<ReviewModeBody> {
    Json(ReviewModeBody {
        review_mode: state.preferences.load_review_mode().await,
    })
}

async fn update_review_mode(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReviewModeBody>,
) -> Json<ReviewModeBody> {
    state.preferences.save_review_mode(body.review_mode).await;
    Json(body)
}
