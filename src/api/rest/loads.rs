use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::{ok, ApiResult};
use crate::auth::Caller;
use crate::engine::catalog::{self, NewLoad};
use crate::engine::feedback;
use crate::engine::scoring::RankedVehicle;
use crate::models::feedback::Message;
use crate::models::load::Load;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/loads", post(create_load))
        .route("/loads/:id", get(get_load).delete(delete_load))
        .route("/loads/:id/candidates", get(candidates))
        .route("/loads/:id/messages", get(list_messages))
        .route("/messages", post(send_message))
}

async fn create_load(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(payload): Json<NewLoad>,
) -> ApiResult<Load> {
    Ok(ok(catalog::create_load(&state, &caller, payload)?))
}

async fn get_load(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Load> {
    Ok(ok(catalog::get_load(&state, id)?))
}

async fn delete_load(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Load> {
    Ok(ok(catalog::delete_load(&state, &caller, id)?))
}

async fn candidates(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<RankedVehicle>> {
    Ok(ok(catalog::candidates(&state, &caller, id)?))
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<Message>> {
    Ok(ok(feedback::list_messages(&state, &caller, id)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub load_id: Uuid,
    pub recipient_id: Uuid,
    pub body: String,
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(payload): Json<SendMessageRequest>,
) -> ApiResult<Message> {
    let message = feedback::send_message(
        &state,
        &caller,
        payload.load_id,
        payload.recipient_id,
        &payload.body,
    )?;
    Ok(ok(message))
}
