use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::moderation::{
    ModerationStatus, ModerationStatusResponse, PredictRequest, SubmitRequest, SubmitResponse,
};
use crate::services::moderation::SubmitError;

/// POST /api/v1/moderation — submit an ad for asynchronous moderation.
pub async fn submit_moderation(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), StatusCode> {
    request
        .validate()
        .map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?;

    match state.moderation.submit(request.item_id).await {
        Ok(task_id) => Ok((
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                task_id,
                status: ModerationStatus::Pending,
                message: "Moderation request accepted".to_string(),
            }),
        )),
        Err(SubmitError::ItemNotFound(item_id)) => {
            tracing::warn!(item_id, "Moderation requested for unknown item");
            Err(StatusCode::NOT_FOUND)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to submit moderation request");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /api/v1/moderation/{task_id} — poll a moderation task's status.
pub async fn get_moderation_result(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
) -> Result<Json<ModerationStatusResponse>, StatusCode> {
    match state.moderation.lookup(task_id).await {
        Ok(Some(result)) => Ok(Json(result.into())),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!(task_id, error = %e, "Failed to look up moderation result");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// POST /api/v1/predict — synchronous rule-based check. Verified sellers,
/// and unverified sellers with at least one image, pass without violation.
pub async fn predict(Json(request): Json<PredictRequest>) -> Result<Json<bool>, StatusCode> {
    request
        .validate()
        .map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?;

    let is_violation = !(request.is_verified_seller || request.images_qty > 0);
    Ok(Json(is_violation))
}
