//! Time-boxed auctions for a single load. Expiry is lazy: reading a session
//! past its end time closes it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Caller;
use crate::engine::assignment::{self, NewAssignment};
use crate::engine::matching::require_compatible;
use crate::error::AppError;
use crate::models::assignment::{AssignmentSource, LoadAssignment};
use crate::models::bidding::{Bid, BidStatus, BiddingSession, SessionStatus, TransportRequest};
use crate::models::load::LoadStatus;
use crate::models::offer::{Decision, OfferStatus};
use crate::models::user::Role;
use crate::notify::{EventKind, Room};
use crate::state::AppState;
use crate::store::WriteTxn;

#[derive(Debug, Clone)]
pub struct OpenSession {
    pub load_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub min_bid_amount: Option<f64>,
    pub max_bid_amount: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PlaceBid {
    pub session_id: Uuid,
    pub vehicle_id: Uuid,
    pub bid_amount: f64,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub session: BiddingSession,
    pub bid: Bid,
    pub transport_request: TransportRequest,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedBid {
    pub session: BiddingSession,
    pub bid: Bid,
    pub transport_request: TransportRequest,
    pub assignment: LoadAssignment,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportResponse {
    pub transport_request: TransportRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<LoadAssignment>,
}

/// Highest amount first; at equal amounts the earlier bid comes first.
pub fn sort_for_display(bids: &mut [Bid]) {
    bids.sort_by(|a, b| {
        b.bid_amount
            .total_cmp(&a.bid_amount)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

fn validate_bound(value: Option<f64>, field: &str) -> Result<(), AppError> {
    match value {
        Some(amount) if !amount.is_finite() || amount < 0.0 => Err(AppError::InvalidInput(
            format!("{field} must be a non-negative amount"),
        )),
        _ => Ok(()),
    }
}

fn find_session(state: &AppState, session_id: Uuid) -> Result<BiddingSession, AppError> {
    state
        .store
        .session(session_id)
        .ok_or_else(|| AppError::not_found("Bidding session"))
}

/// Closes `session` if it is active and past its end time. Returns the current
/// session and whether this call closed it.
fn expire_if_due(
    state: &AppState,
    txn: &WriteTxn<'_>,
    session: BiddingSession,
) -> Result<(BiddingSession, bool), AppError> {
    let now = state.now();
    if !session.is_expired(now) {
        return Ok((session, false));
    }

    let closed = state.store.update_session(txn, session.id, |s| {
        s.status = SessionStatus::Closed;
        s.updated_at = now;
    })?;
    state.metrics.active_bidding_sessions.dec();

    info!(session_id = %closed.id, load_id = %closed.load_id, "bidding session expired");
    Ok((closed, true))
}

fn announce_closed(state: &AppState, session: &BiddingSession) {
    state
        .notifier
        .publish(Room::Bidding(session.id), EventKind::BiddingClosed, session);
}

pub fn open_session(
    state: &AppState,
    caller: &Caller,
    request: OpenSession,
) -> Result<BiddingSession, AppError> {
    caller.require(Role::LoadProvider)?;

    let txn = state.store.write();
    let load = state
        .store
        .load(request.load_id)
        .filter(|load| load.provider_id == caller.user_id)
        .ok_or_else(|| AppError::not_found("Load"))?;

    if state.store.session_for_load(load.id).is_some() {
        return Err(AppError::Conflict(
            "A bidding session already exists for this load".to_string(),
        ));
    }

    let now = state.now();
    if request.start_time < now - state.settings.session_start_grace {
        return Err(AppError::InvalidInput(
            "Start time cannot be in the past".to_string(),
        ));
    }
    if request.end_time <= request.start_time {
        return Err(AppError::InvalidInput(
            "End time must be after start time".to_string(),
        ));
    }

    validate_bound(request.min_bid_amount, "minBidAmount")?;
    validate_bound(request.max_bid_amount, "maxBidAmount")?;
    if let (Some(min), Some(max)) = (request.min_bid_amount, request.max_bid_amount) {
        if min > max {
            return Err(AppError::InvalidInput(
                "minBidAmount cannot exceed maxBidAmount".to_string(),
            ));
        }
    }

    if load.status != LoadStatus::Posted {
        return Err(AppError::InvalidState(
            "Only posted loads can be opened for bidding".to_string(),
        ));
    }

    let session = BiddingSession {
        id: Uuid::new_v4(),
        load_id: load.id,
        load_provider_id: caller.user_id,
        start_time: request.start_time,
        end_time: request.end_time,
        status: SessionStatus::Active,
        min_bid_amount: request.min_bid_amount,
        max_bid_amount: request.max_bid_amount,
        winning_bid_id: None,
        total_bids: 0,
        created_at: now,
        updated_at: now,
    };

    state.store.insert_session(&txn, session.clone())?;
    state.store.update_load(&txn, load.id, |load| {
        load.status = LoadStatus::Bidding;
        load.updated_at = now;
    })?;
    drop(txn);

    state.metrics.active_bidding_sessions.inc();
    info!(
        session_id = %session.id,
        load_id = %load.id,
        start_time = %session.start_time,
        end_time = %session.end_time,
        "bidding session opened"
    );
    Ok(session)
}

pub fn place_bid(state: &AppState, caller: &Caller, request: PlaceBid) -> Result<Bid, AppError> {
    let txn = state.store.write();
    let session = find_session(state, request.session_id)?;
    let vehicle = state
        .store
        .vehicle(request.vehicle_id)
        .filter(|vehicle| vehicle.owner_id == caller.user_id)
        .ok_or_else(|| AppError::NotFound("Vehicle not found or not owned by you".to_string()))?;

    let (session, expired) = expire_if_due(state, &txn, session)?;
    if expired {
        drop(txn);
        announce_closed(state, &session);
        warn!(session_id = %session.id, owner_id = %caller.user_id, "bid arrived after session end");
        return Err(AppError::InvalidState("Bidding session has ended".to_string()));
    }
    if session.status != SessionStatus::Active {
        return Err(AppError::InvalidState("Bidding session is not active".to_string()));
    }

    let now = state.now();
    if now < session.start_time {
        return Err(AppError::InvalidState("Bidding has not started yet".to_string()));
    }

    if !request.bid_amount.is_finite() || request.bid_amount <= 0.0 {
        return Err(AppError::InvalidInput(
            "Bid amount must be a positive amount".to_string(),
        ));
    }
    if !session.accepts_amount(request.bid_amount) {
        return Err(AppError::InvalidInput(bounds_message(&session)));
    }

    let load = state
        .store
        .load(session.load_id)
        .ok_or_else(|| AppError::not_found("Load"))?;
    require_compatible(&vehicle, &load)?;

    let (bid, kind) = match state.store.bid_by_owner(session.id, caller.user_id) {
        Some(existing) => {
            let bid = state.store.update_bid(&txn, existing.id, |bid| {
                bid.bid_amount = request.bid_amount;
                bid.message = request.message.clone();
                bid.vehicle_id = vehicle.id;
                bid.status = BidStatus::Active;
                bid.is_winning = false;
                bid.updated_at = now;
            })?;
            (bid, EventKind::BidUpdated)
        }
        None => {
            let bid = Bid {
                id: Uuid::new_v4(),
                bidding_session_id: session.id,
                load_id: session.load_id,
                vehicle_id: vehicle.id,
                vehicle_owner_id: caller.user_id,
                bid_amount: request.bid_amount,
                message: request.message.clone(),
                status: BidStatus::Active,
                is_winning: false,
                created_at: now,
                updated_at: now,
            };
            state.store.insert_bid(&txn, bid.clone())?;
            state.store.update_session(&txn, session.id, |s| {
                s.total_bids += 1;
                s.updated_at = now;
            })?;
            (bid, EventKind::NewBid)
        }
    };
    drop(txn);

    let kind_label = if kind == EventKind::NewBid { "new" } else { "updated" };
    state.metrics.bids_total.with_label_values(&[kind_label]).inc();
    info!(
        session_id = %session.id,
        bid_id = %bid.id,
        owner_id = %caller.user_id,
        amount = bid.bid_amount,
        kind = kind_label,
        "bid placed"
    );

    state.notifier.publish(Room::Bidding(session.id), kind, &bid);
    state
        .notifier
        .publish(Room::User(session.load_provider_id), EventKind::NewBid, &bid);

    Ok(bid)
}

fn bounds_message(session: &BiddingSession) -> String {
    match (session.min_bid_amount, session.max_bid_amount) {
        (Some(min), Some(max)) => format!("Bid amount must be between {min} and {max}"),
        (Some(min), None) => format!("Bid amount must be at least {min}"),
        (None, Some(max)) => format!("Bid amount must be at most {max}"),
        (None, None) => "Bid amount is out of range".to_string(),
    }
}

pub fn withdraw_bid(state: &AppState, caller: &Caller, bid_id: Uuid) -> Result<Bid, AppError> {
    let txn = state.store.write();
    let bid = state
        .store
        .bid(bid_id)
        .filter(|bid| bid.vehicle_owner_id == caller.user_id)
        .ok_or_else(|| AppError::not_found("Bid"))?;

    let session = find_session(state, bid.bidding_session_id)?;
    let (session, expired) = expire_if_due(state, &txn, session)?;
    if session.status != SessionStatus::Active {
        drop(txn);
        if expired {
            announce_closed(state, &session);
        }
        return Err(AppError::InvalidState("Bidding session is not active".to_string()));
    }
    if bid.status != BidStatus::Active {
        return Err(AppError::InvalidState("Bid is not active".to_string()));
    }

    let now = state.now();
    let bid = state.store.update_bid(&txn, bid_id, |bid| {
        bid.status = BidStatus::Withdrawn;
        bid.updated_at = now;
    })?;
    drop(txn);

    info!(bid_id = %bid.id, session_id = %session.id, "bid withdrawn");
    state
        .notifier
        .publish(Room::Bidding(session.id), EventKind::BidUpdated, &bid);
    Ok(bid)
}

pub fn close_session(
    state: &AppState,
    caller: &Caller,
    session_id: Uuid,
) -> Result<BiddingSession, AppError> {
    let txn = state.store.write();
    let session = find_session(state, session_id)?;

    if !caller.is_admin() && session.load_provider_id != caller.user_id {
        return Err(AppError::Forbidden(
            "Only the load provider or an admin can close this session".to_string(),
        ));
    }

    let (session, expired) = expire_if_due(state, &txn, session)?;
    if expired {
        drop(txn);
        announce_closed(state, &session);
        return Ok(session);
    }
    if session.status != SessionStatus::Active {
        return Err(AppError::InvalidState("Bidding session is not active".to_string()));
    }

    let now = state.now();
    let session = state.store.update_session(&txn, session_id, |s| {
        s.status = SessionStatus::Closed;
        s.updated_at = now;
    })?;
    drop(txn);

    state.metrics.active_bidding_sessions.dec();
    info!(session_id = %session.id, closed_by = %caller.user_id, "bidding session closed");
    announce_closed(state, &session);
    Ok(session)
}

/// Looks up the session a provider is picking a winner in, applying lazy
/// expiry. Returns the session and whether this call closed it.
fn session_for_selection(
    state: &AppState,
    txn: &WriteTxn<'_>,
    caller: &Caller,
    session_id: Uuid,
) -> Result<(BiddingSession, bool), AppError> {
    let session = find_session(state, session_id)?;
    if session.load_provider_id != caller.user_id {
        return Err(AppError::Forbidden(
            "Only the load provider can select a winning bid".to_string(),
        ));
    }
    expire_if_due(state, txn, session)
}

/// Marks `bid_id` as the winner of `session` and creates its transport
/// request. All checks run before the first write. With `then_assign`, also
/// checks that the load can be assigned, so the caller's assignment cannot fail
/// after these writes.
fn resolve_winner(
    state: &AppState,
    txn: &WriteTxn<'_>,
    session: &BiddingSession,
    bid_id: Uuid,
    message: Option<String>,
    then_assign: bool,
) -> Result<Selection, AppError> {
    if session.status == SessionStatus::Completed {
        return Err(AppError::InvalidState(
            "A winning bid has already been selected".to_string(),
        ));
    }
    if state.store.assignment_for_load(session.load_id).is_some() {
        return Err(AppError::Conflict("Load already has an assignment".to_string()));
    }
    let load = state
        .store
        .load(session.load_id)
        .ok_or_else(|| AppError::not_found("Load"))?;
    if !load.status.is_open() {
        return Err(AppError::InvalidState(
            "Load is no longer open for assignment".to_string(),
        ));
    }

    let bid = state
        .store
        .bid(bid_id)
        .filter(|bid| bid.bidding_session_id == session.id)
        .ok_or_else(|| AppError::NotFound("Bid not found in this session".to_string()))?;
    if bid.status != BidStatus::Active {
        return Err(AppError::InvalidState("Bid is no longer active".to_string()));
    }
    let vehicle = state
        .store
        .vehicle(bid.vehicle_id)
        .ok_or_else(|| AppError::not_found("Vehicle"))?;
    require_compatible(&vehicle, &load)?;
    if state.store.has_transport_request(bid.load_id, bid.vehicle_id) {
        return Err(AppError::Conflict(
            "A transport request for this vehicle and load already exists".to_string(),
        ));
    }
    if then_assign {
        assignment::ensure_assignable(state, bid.load_id, bid.vehicle_id)?;
    }

    let now = state.now();
    let was_active = session.status == SessionStatus::Active;
    let session = state.store.update_session(txn, session.id, |s| {
        s.status = SessionStatus::Completed;
        s.winning_bid_id = Some(bid.id);
        s.updated_at = now;
    })?;
    if was_active {
        state.metrics.active_bidding_sessions.dec();
    }

    let bid = state.store.update_bid(txn, bid.id, |bid| {
        bid.status = BidStatus::Selected;
        bid.is_winning = true;
        bid.updated_at = now;
    })?;

    let transport_request = TransportRequest {
        id: Uuid::new_v4(),
        load_id: bid.load_id,
        vehicle_id: bid.vehicle_id,
        load_provider_id: session.load_provider_id,
        vehicle_owner_id: bid.vehicle_owner_id,
        bid_id: bid.id,
        bidding_session_id: session.id,
        agreed_price: bid.bid_amount,
        message,
        status: OfferStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    state
        .store
        .insert_transport_request(txn, transport_request.clone())?;

    info!(
        session_id = %session.id,
        bid_id = %bid.id,
        transport_request_id = %transport_request.id,
        amount = bid.bid_amount,
        "winning bid selected"
    );

    Ok(Selection {
        session,
        bid,
        transport_request,
    })
}

fn announce_winner(state: &AppState, selection: &Selection) {
    state.notifier.publish(
        Room::Bidding(selection.session.id),
        EventKind::BidAccepted,
        selection,
    );
    state.notifier.publish(
        Room::User(selection.bid.vehicle_owner_id),
        EventKind::TransportRequest,
        &selection.transport_request,
    );
}

pub fn select_winning_bid(
    state: &AppState,
    caller: &Caller,
    session_id: Uuid,
    bid_id: Uuid,
    message: Option<String>,
) -> Result<Selection, AppError> {
    let txn = state.store.write();
    let (session, expired) = session_for_selection(state, &txn, caller, session_id)?;
    let outcome = resolve_winner(state, &txn, &session, bid_id, message, false);
    drop(txn);

    // An expiry found here is committed whether or not the selection succeeds.
    if expired {
        announce_closed(state, &session);
    }
    let selection = outcome?;
    announce_winner(state, &selection);
    Ok(selection)
}

/// Selects the bid and assigns the load in one step, skipping the owner's
/// confirmation.
pub fn accept_bid_and_assign(
    state: &AppState,
    caller: &Caller,
    session_id: Uuid,
    bid_id: Uuid,
) -> Result<AcceptedBid, AppError> {
    let txn = state.store.write();
    let (session, expired) = session_for_selection(state, &txn, caller, session_id)?;
    let outcome = resolve_winner(state, &txn, &session, bid_id, None, true).and_then(|selection| {
        let mut request = NewAssignment::new(
            selection.bid.load_id,
            selection.bid.vehicle_id,
            selection.bid.bid_amount,
            AssignmentSource::Bidding,
        );
        request.transport_request_id = Some(selection.transport_request.id);

        let resolution = assignment::create_assignment(state, &txn, request)?;
        let transport_request = state
            .store
            .transport_request(selection.transport_request.id)
            .ok_or_else(|| AppError::not_found("Transport request"))?;
        Ok((
            Selection {
                transport_request,
                ..selection
            },
            resolution,
        ))
    });
    drop(txn);

    if expired {
        announce_closed(state, &session);
    }
    let (selection, resolution) = outcome?;
    announce_winner(state, &selection);
    assignment::announce(state, &resolution);

    Ok(AcceptedBid {
        session: selection.session,
        bid: selection.bid,
        transport_request: selection.transport_request,
        assignment: resolution.assignment,
    })
}

pub fn respond_to_transport_request(
    state: &AppState,
    caller: &Caller,
    request_id: Uuid,
    decision: Decision,
) -> Result<TransportResponse, AppError> {
    let txn = state.store.write();
    let request = state
        .store
        .transport_request(request_id)
        .ok_or_else(|| AppError::not_found("Transport request"))?;

    if request.vehicle_owner_id != caller.user_id {
        return Err(AppError::Forbidden(
            "This transport request was not sent to you".to_string(),
        ));
    }
    if request.status != OfferStatus::Pending {
        return Err(AppError::InvalidState(
            "Transport request has already been answered".to_string(),
        ));
    }

    match decision {
        Decision::Accepted => {
            let mut new = NewAssignment::new(
                request.load_id,
                request.vehicle_id,
                request.agreed_price,
                AssignmentSource::Bidding,
            );
            new.transport_request_id = Some(request.id);

            let resolution = assignment::create_assignment(state, &txn, new)?;
            let transport_request = state
                .store
                .transport_request(request_id)
                .ok_or_else(|| AppError::not_found("Transport request"))?;
            drop(txn);

            assignment::announce(state, &resolution);
            Ok(TransportResponse {
                transport_request,
                assignment: Some(resolution.assignment),
            })
        }
        Decision::Rejected => {
            let now = state.now();
            let transport_request = state.store.update_transport_request(&txn, request_id, |r| {
                r.status = OfferStatus::Rejected;
                r.updated_at = now;
            })?;

            // Hand the choice back to the provider: no winner, bid back in play.
            state
                .store
                .update_session(&txn, request.bidding_session_id, |s| {
                    if s.winning_bid_id == Some(request.bid_id) {
                        s.status = SessionStatus::Closed;
                        s.winning_bid_id = None;
                        s.updated_at = now;
                    }
                })?;
            let bid = state.store.update_bid(&txn, request.bid_id, |bid| {
                bid.status = BidStatus::Active;
                bid.is_winning = false;
                bid.updated_at = now;
            })?;
            drop(txn);

            info!(transport_request_id = %request_id, "transport request rejected");
            state.notifier.publish(
                Room::User(request.load_provider_id),
                EventKind::TransportRequest,
                &transport_request,
            );
            state.notifier.publish(
                Room::Bidding(request.bidding_session_id),
                EventKind::BidUpdated,
                &bid,
            );

            Ok(TransportResponse {
                transport_request,
                assignment: None,
            })
        }
    }
}

pub fn get_session(state: &AppState, session_id: Uuid) -> Result<BiddingSession, AppError> {
    let txn = state.store.write();
    let session = find_session(state, session_id)?;
    let (session, expired) = expire_if_due(state, &txn, session)?;
    drop(txn);

    if expired {
        announce_closed(state, &session);
    }
    Ok(session)
}

/// Sessions still taking bids, soonest-ending first.
pub fn list_active_sessions(state: &AppState) -> Result<Vec<BiddingSession>, AppError> {
    let txn = state.store.write();
    let mut active = Vec::new();
    let mut expired = Vec::new();

    for session in state.store.sessions() {
        if session.status != SessionStatus::Active {
            continue;
        }
        let (session, just_expired) = expire_if_due(state, &txn, session)?;
        if just_expired {
            expired.push(session);
        } else {
            active.push(session);
        }
    }
    drop(txn);

    for session in &expired {
        announce_closed(state, session);
    }

    active.sort_by_key(|session| session.end_time);
    Ok(active)
}

/// The provider (or an admin) sees every live bid; an owner sees only their own.
pub fn list_bids(
    state: &AppState,
    caller: &Caller,
    session_id: Uuid,
) -> Result<Vec<Bid>, AppError> {
    let session = get_session(state, session_id)?;
    let sees_all = caller.is_admin() || session.load_provider_id == caller.user_id;

    let mut bids: Vec<Bid> = state
        .store
        .bids_for_session(session.id)
        .into_iter()
        .filter(|bid| {
            if sees_all {
                bid.status != BidStatus::Withdrawn
            } else {
                bid.vehicle_owner_id == caller.user_id
            }
        })
        .collect();

    sort_for_display(&mut bids);
    Ok(bids)
}
