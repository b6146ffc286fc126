use std::sync::Arc;
use axum::Router;
use axum::routing::{get, post};
use crate::backend::routes::job::{job_state, notifications, refresh_job, submit_job, track_job};
use crate::backend::state::BackendState;

mod job;

pub fn api_routes() -> Router<Arc<BackendState>> {
    Router::new()
        .route("/model/jobs", post(submit_job))
        .route("/model/jobs/{id}/track", post(track_job))
        .route("/model/refresh", post(refresh_job))
        .route("/model/state", get(job_state))
        .route("/model/notifications", get(notifications))
}
