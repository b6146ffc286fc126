use std::sync::Arc;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use pm_core::{Notification, PollState};
use crate::backend::schemas::{JobAccepted, SubmitJobRequest};
use crate::backend::state::BackendState;
use crate::error::AppError;

pub async fn submit_job(
    State(state): State<Arc<BackendState>>,
    Json(req): Json<SubmitJobRequest>,
) -> Result<(StatusCode, Json<JobAccepted>), AppError> {
    let job = state.generator.submit(&req.image_url).await?;
    Ok((StatusCode::ACCEPTED, Json(job.into())))
}

pub async fn track_job(
    State(state): State<Arc<BackendState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<JobAccepted>), AppError> {
    let job = state.generator.track(&id)?;
    Ok((StatusCode::ACCEPTED, Json(job.into())))
}

pub async fn refresh_job(State(state): State<Arc<BackendState>>) -> Result<StatusCode, AppError> {
    state.generator.refresh()?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn job_state(State(state): State<Arc<BackendState>>) -> Json<PollState> {
    Json(state.generator.state())
}

pub async fn notifications(State(state): State<Arc<BackendState>>) -> Json<Vec<Notification>> {
    Json(state.notifications.recent())
}
