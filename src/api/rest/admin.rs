use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::{ok, ApiResult};
use crate::auth::Caller;
use crate::engine::assignment::{self, AdminMatch};
use crate::engine::{catalog, offers};
use crate::models::offer::VehicleApplication;
use crate::models::vehicle::Vehicle;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/vehicles/:id/approval", patch(review_vehicle))
        .route("/admin/applications/:id/review", patch(review_application))
        .route("/admin/match-loads", post(match_load))
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub approve: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

async fn review_vehicle(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> ApiResult<Vehicle> {
    let vehicle = catalog::review_vehicle(&state, &caller, id, payload.approve, payload.reason)?;
    Ok(ok(vehicle))
}

async fn review_application(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> ApiResult<VehicleApplication> {
    Ok(ok(offers::review_application(&state, &caller, id, payload.approve)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    pub load_id: Uuid,
    pub vehicle_id: Uuid,
    #[serde(default)]
    pub agreed_price: Option<f64>,
}

async fn match_load(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(payload): Json<MatchRequest>,
) -> ApiResult<AdminMatch> {
    let matched = assignment::admin_match(
        &state,
        &caller,
        payload.load_id,
        payload.vehicle_id,
        payload.agreed_price,
    )?;
    Ok(ok(matched))
}
