use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::{ok, ApiResult};
use crate::auth::Caller;
use crate::engine::catalog::{self, NewVehicle};
use crate::engine::offers::{self, ApplicationOutcome, VehicleRequestOutcome};
use crate::models::offer::{Decision, VehicleApplication, VehicleRequest};
use crate::models::vehicle::Vehicle;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/vehicles", post(create_vehicle).get(list_vehicles))
        .route("/vehicles/apply", post(apply))
        .route("/vehicles/application/:id/respond", patch(respond_to_application))
        .route("/vehicles/requests", post(send_request))
        .route("/vehicles/requests/:id/respond", patch(respond_to_request))
}

async fn create_vehicle(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(payload): Json<NewVehicle>,
) -> ApiResult<Vehicle> {
    Ok(ok(catalog::create_vehicle(&state, &caller, payload)?))
}

async fn list_vehicles(State(state): State<Arc<AppState>>, caller: Caller) -> ApiResult<Vec<Vehicle>> {
    Ok(ok(catalog::list_own_vehicles(&state, &caller)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    pub load_id: Uuid,
    pub vehicle_id: Uuid,
    pub bid_price: f64,
    #[serde(default)]
    pub message: Option<String>,
}

async fn apply(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(payload): Json<ApplyRequest>,
) -> ApiResult<VehicleApplication> {
    let application = offers::apply_for_load(
        &state,
        &caller,
        payload.load_id,
        payload.vehicle_id,
        payload.bid_price,
        payload.message,
    )?;
    Ok(ok(application))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondRequest {
    pub status: Decision,
    #[serde(default)]
    pub agreed_price: Option<f64>,
}

async fn respond_to_application(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<RespondRequest>,
) -> ApiResult<ApplicationOutcome> {
    let outcome =
        offers::respond_to_application(&state, &caller, id, payload.status, payload.agreed_price)?;
    Ok(ok(outcome))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub load_id: Uuid,
    pub vehicle_id: Uuid,
    pub proposed_price: f64,
    #[serde(default)]
    pub message: Option<String>,
}

async fn send_request(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(payload): Json<SendRequest>,
) -> ApiResult<VehicleRequest> {
    let request = offers::send_vehicle_request(
        &state,
        &caller,
        payload.load_id,
        payload.vehicle_id,
        payload.proposed_price,
        payload.message,
    )?;
    Ok(ok(request))
}

async fn respond_to_request(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<RespondRequest>,
) -> ApiResult<VehicleRequestOutcome> {
    Ok(ok(offers::respond_to_vehicle_request(&state, &caller, id, payload.status)?))
}
