//! API route handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use tracing::{debug, info};

use warden_core::{TaskEnvelope, TaskRequest};
use warden_storage::{export_queue, snapshot};

use crate::error::{ApiError, Result};
use crate::models::{
    ExportResponse, HealthResponse, MarkReviewedRequest, MarkReviewedResponse,
    OversightQueueResponse,
};
use crate::state::AppState;

/// POST /coordinated-request - Screen a task request and dispatch it.
pub async fn coordinated_request(
    State(state): State<AppState>,
    body: std::result::Result<Json<TaskRequest>, JsonRejection>,
) -> Result<Json<TaskEnvelope>> {
    let Json(req) = body.map_err(|e| ApiError::Validation(e.body_text()))?;

    debug!(task_type = ?req.task_type, "Coordinating request");

    let envelope = state
        .coordinator
        .coordinate_until(req, state.cancelled())
        .await?;

    Ok(Json(envelope))
}

/// GET /safety/oversight-queue - List the review queue.
pub async fn oversight_queue(State(state): State<AppState>) -> Result<Json<OversightQueueResponse>> {
    let snapshot = state.reviews.snapshot()?;

    Ok(Json(OversightQueueResponse {
        queue_length: snapshot.len(),
        pending_reviews: snapshot.pending,
        reviewed_items: snapshot.reviewed,
    }))
}

/// POST /safety/mark-reviewed - Resolve a pending review item.
pub async fn mark_reviewed(
    State(state): State<AppState>,
    body: std::result::Result<Json<MarkReviewedRequest>, JsonRejection>,
) -> Result<Json<MarkReviewedResponse>> {
    let Json(req) = body.map_err(|e| ApiError::Validation(e.body_text()))?;

    if req.review_decision.trim().is_empty() {
        return Err(ApiError::Validation(
            "review_decision must not be empty".to_string(),
        ));
    }

    let item = state.reviews.mark_reviewed(
        &req.review_id,
        &req.review_decision,
        req.reviewer_notes.as_deref(),
    )?;

    info!(
        review_id = %item.review_id,
        decision = %req.review_decision,
        "Review item marked as reviewed"
    );

    Ok(Json(MarkReviewedResponse {
        status: "success",
        review_id: item.review_id,
        reviewed_at: item.reviewed_at,
    }))
}

/// GET /safety/export-queue - Snapshot the queue, writing it to disk when configured.
pub async fn export(State(state): State<AppState>) -> Result<Json<ExportResponse>> {
    let response = match &state.export_dir {
        Some(dir) => {
            let (path, export) = export_queue(state.reviews.as_ref(), dir)?;
            ExportResponse {
                export,
                exported_to: Some(path.display().to_string()),
            }
        }
        None => ExportResponse {
            export: snapshot(state.reviews.as_ref())?,
            exported_to: None,
        },
    };

    Ok(Json(response))
}

/// GET /health - Liveness and a summary of what is configured.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let queue_length = state.reviews.len()?;
    let pending_reviews = state.reviews.pending_len()?;

    Ok(Json(HealthResponse {
        status: if state.is_shutting_down() {
            "shutting_down"
        } else {
            "ok"
        },
        queue_length,
        pending_reviews,
        handlers: state.coordinator.handlers().task_types(),
    }))
}
