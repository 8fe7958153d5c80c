//! Axum route handlers for the Apply API.

use axum::{extract::State, http::StatusCode, Json};
use reqwest::Url;
use tracing::error;

use crate::apply::history::{record_run, tracked_record};
use crate::apply::outcome::ApplicationResult;
use crate::errors::{AppError, AppJson};
use crate::models::application::ApplicationRequest;
use crate::models::history::{ApplicationHistoryRecord, TrackApplicationRequest};
use crate::models::user::CurrentUser;
use crate::state::AppState;

/// POST /api/apply
///
/// Runs the matching pipeline against one job board and records every outcome in the
/// caller's history. A blank board URL yields an empty result; history write failures
/// are logged and do not affect the response.
pub async fn handle_apply(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(mut request): AppJson<ApplicationRequest>,
) -> Result<Json<ApplicationResult>, AppError> {
    validate_board_url(&request.job_board_url)?;
    request.requester_identity = user.identity;

    let result = state.orchestrator.run(&request).await;

    if let Err(e) = record_run(state.history.as_ref(), &request, &result).await {
        error!(
            "Failed to record application history for {}: {e}",
            request.requester_identity
        );
    }

    Ok(Json(result))
}

/// GET /api/apply/history
///
/// The caller's records, newest first.
pub async fn handle_history(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<ApplicationHistoryRecord>>, AppError> {
    Ok(Json(state.history.list_for_owner(&user.identity).await?))
}

/// POST /api/apply/track
///
/// Records an application made outside the pipeline.
pub async fn handle_track(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(request): AppJson<TrackApplicationRequest>,
) -> Result<(StatusCode, Json<ApplicationHistoryRecord>), AppError> {
    if request.job_title.trim().is_empty() {
        return Err(AppError::Validation("Job title is required".to_string()));
    }
    if request.job_url.trim().is_empty() {
        return Err(AppError::Validation("Job URL is required".to_string()));
    }

    let record = tracked_record(&user.identity, request);
    state.history.persist(&record).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Blank is allowed (the pipeline treats it as a no-op); anything else must be an
/// absolute http(s) URL.
fn validate_board_url(raw: &str) -> Result<(), AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(AppError::Validation(format!(
            "job_board_url is not a valid http(s) URL: {trimmed}"
        ))),
    }
}
