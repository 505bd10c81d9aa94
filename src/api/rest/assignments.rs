use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::{ok, ApiResult};
use crate::auth::Caller;
use crate::engine::{feedback, status};
use crate::error::AppError;
use crate::models::assignment::{AssignmentStatus, LoadAssignment};
use crate::models::feedback::Rating;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/load-assignments/:id", get(get_assignment))
        .route("/load-assignments/:id/status", put(update_status))
        .route("/load-assignments/:id/complete", put(complete))
        .route("/load-assignments/:id/ratings", post(rate))
}

async fn get_assignment(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<LoadAssignment> {
    let assignment = state
        .store
        .assignment(id)
        .filter(|a| caller.is_admin() || a.involves(caller.user_id))
        .ok_or_else(|| AppError::not_found("Assignment"))?;
    Ok(ok(assignment))
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: AssignmentStatus,
    #[serde(default, alias = "notes")]
    pub note: Option<String>,
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusRequest>,
) -> ApiResult<LoadAssignment> {
    let updated = status::update_status(&state, &caller, id, payload.status, payload.note)?;
    Ok(ok(updated))
}

async fn complete(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<LoadAssignment> {
    Ok(ok(status::complete(&state, &caller, id)?))
}

#[derive(Deserialize)]
pub struct RatingRequest {
    pub score: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

async fn rate(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<RatingRequest>,
) -> ApiResult<Rating> {
    let rating = feedback::rate_assignment(&state, &caller, id, payload.score, payload.comment)?;
    Ok(ok(rating))
}
