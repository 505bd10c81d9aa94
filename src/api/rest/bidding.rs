use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::{ok, ApiResult};
use crate::auth::Caller;
use crate::engine::bidding::{
    self, AcceptedBid, OpenSession, PlaceBid, Selection, TransportResponse,
};
use crate::models::bidding::{Bid, BiddingSession};
use crate::models::offer::Decision;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bidding/sessions", post(open_session))
        .route("/bidding/sessions/active", get(active_sessions))
        .route("/bidding/sessions/:id", get(get_session))
        .route("/bidding/sessions/:id/bids", get(list_bids))
        .route("/bidding/sessions/:id/close", patch(close_session))
        .route("/bidding/sessions/:id/select-bid", patch(select_bid))
        .route("/bidding/sessions/:id/accept-bid", patch(accept_bid))
        .route("/bidding/bids", post(place_bid))
        .route("/bidding/bids/:id", delete(withdraw_bid))
        .route(
            "/bidding/transport-requests/:id/respond",
            patch(respond_to_transport_request),
        )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    pub load_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub min_bid_amount: Option<f64>,
    #[serde(default)]
    pub max_bid_amount: Option<f64>,
}

async fn open_session(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(payload): Json<OpenSessionRequest>,
) -> ApiResult<BiddingSession> {
    let session = bidding::open_session(
        &state,
        &caller,
        OpenSession {
            load_id: payload.load_id,
            start_time: payload.start_time,
            end_time: payload.end_time,
            min_bid_amount: payload.min_bid_amount,
            max_bid_amount: payload.max_bid_amount,
        },
    )?;
    Ok(ok(session))
}

async fn active_sessions(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
) -> ApiResult<Vec<BiddingSession>> {
    Ok(ok(bidding::list_active_sessions(&state)?))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<BiddingSession> {
    Ok(ok(bidding::get_session(&state, id)?))
}

async fn list_bids(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<Bid>> {
    Ok(ok(bidding::list_bids(&state, &caller, id)?))
}

async fn close_session(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<BiddingSession> {
    Ok(ok(bidding::close_session(&state, &caller, id)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectBidRequest {
    pub bid_id: Uuid,
    #[serde(default)]
    pub message: Option<String>,
}

async fn select_bid(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<SelectBidRequest>,
) -> ApiResult<Selection> {
    let selection =
        bidding::select_winning_bid(&state, &caller, id, payload.bid_id, payload.message)?;
    Ok(ok(selection))
}

async fn accept_bid(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<SelectBidRequest>,
) -> ApiResult<AcceptedBid> {
    Ok(ok(bidding::accept_bid_and_assign(&state, &caller, id, payload.bid_id)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBidRequest {
    pub bidding_session_id: Uuid,
    pub vehicle_id: Uuid,
    pub bid_amount: f64,
    #[serde(default)]
    pub message: Option<String>,
}

async fn place_bid(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(payload): Json<PlaceBidRequest>,
) -> ApiResult<Bid> {
    let bid = bidding::place_bid(
        &state,
        &caller,
        PlaceBid {
            session_id: payload.bidding_session_id,
            vehicle_id: payload.vehicle_id,
            bid_amount: payload.bid_amount,
            message: payload.message,
        },
    )?;
    Ok(ok(bid))
}

async fn withdraw_bid(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Bid> {
    Ok(ok(bidding::withdraw_bid(&state, &caller, id)?))
}

#[derive(Deserialize)]
pub struct TransportDecision {
    pub status: Decision,
}

async fn respond_to_transport_request(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransportDecision>,
) -> ApiResult<TransportResponse> {
    let response = bidding::respond_to_transport_request(&state, &caller, id, payload.status)?;
    Ok(ok(response))
}
