//! Every accepted offer and admin match ends in [`create_assignment`].

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::AppError;
use crate::models::assignment::{AssignmentSource, AssignmentStatus, LoadAssignment};
use crate::models::bidding::{BiddingSession, SessionStatus};
use crate::models::load::{Load, LoadStatus};
use crate::models::offer::{ApplicationStatus, OfferStatus};
use crate::models::vehicle::{Vehicle, VehicleStatus};
use crate::notify::{EventKind, Room};
use crate::state::AppState;
use crate::store::WriteTxn;

#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub load_id: Uuid,
    pub vehicle_id: Uuid,
    pub agreed_price: f64,
    pub source: AssignmentSource,
    pub application_id: Option<Uuid>,
    pub vehicle_request_id: Option<Uuid>,
    pub transport_request_id: Option<Uuid>,
}

impl NewAssignment {
    pub fn new(load_id: Uuid, vehicle_id: Uuid, agreed_price: f64, source: AssignmentSource) -> Self {
        Self {
            load_id,
            vehicle_id,
            agreed_price,
            source,
            application_id: None,
            vehicle_request_id: None,
            transport_request_id: None,
        }
    }
}

/// Everything a resolution wrote, for the response and the notifications.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub assignment: LoadAssignment,
    pub load: Load,
    pub vehicle: Vehicle,
    pub closed_session: Option<BiddingSession>,
}

/// Checks every precondition of [`create_assignment`] without writing.
pub fn ensure_assignable(
    state: &AppState,
    load_id: Uuid,
    vehicle_id: Uuid,
) -> Result<(Load, Vehicle), AppError> {
    if state.store.assignment_for_load(load_id).is_some() {
        return Err(AppError::Conflict("Load already has an assignment".to_string()));
    }

    let load = state
        .store
        .load(load_id)
        .ok_or_else(|| AppError::not_found("Load"))?;
    let vehicle = state
        .store
        .vehicle(vehicle_id)
        .ok_or_else(|| AppError::not_found("Vehicle"))?;

    if !load.status.is_open() {
        return Err(AppError::InvalidState(
            "Load is no longer open for assignment".to_string(),
        ));
    }
    if !vehicle.is_approved {
        return Err(AppError::InvalidState("Vehicle is not approved".to_string()));
    }
    if vehicle.status != VehicleStatus::Available {
        return Err(AppError::InvalidState("Vehicle is not available".to_string()));
    }

    Ok((load, vehicle))
}

pub fn create_assignment(
    state: &AppState,
    txn: &WriteTxn<'_>,
    request: NewAssignment,
) -> Result<Resolution, AppError> {
    let (load, vehicle) = ensure_assignable(state, request.load_id, request.vehicle_id)?;

    if !request.agreed_price.is_finite() || request.agreed_price < 0.0 {
        return Err(AppError::InvalidInput(
            "agreedPrice must be a non-negative amount".to_string(),
        ));
    }

    let now = state.now();
    let assignment = LoadAssignment {
        id: Uuid::new_v4(),
        load_id: load.id,
        vehicle_id: vehicle.id,
        load_provider_id: load.provider_id,
        vehicle_owner_id: vehicle.owner_id,
        application_id: request.application_id,
        source: request.source,
        agreed_price: request.agreed_price,
        commission_amount: load.commission_for(request.agreed_price),
        status: AssignmentStatus::Assigned,
        assigned_at: now,
        started_at: None,
        delivered_at: None,
        completed_at: None,
        notes: Vec::new(),
        updated_at: now,
    };

    // The unique index on load id is the last word on double assignment.
    state.store.insert_assignment(txn, assignment.clone())?;

    let load = state.store.update_load(txn, load.id, |load| {
        load.status = LoadStatus::Assigned;
        load.assigned_vehicle_id = Some(vehicle.id);
        load.updated_at = now;
    })?;
    let vehicle = state.store.update_vehicle(txn, vehicle.id, |vehicle| {
        vehicle.status = VehicleStatus::Assigned;
        vehicle.updated_at = now;
    })?;

    settle_competing_offers(state, txn, &request)?;

    let closed_session = match state.store.session_for_load(load.id) {
        Some(session) if session.status == SessionStatus::Active => {
            state.metrics.active_bidding_sessions.dec();
            Some(state.store.update_session(txn, session.id, |session| {
                session.status = SessionStatus::Closed;
                session.updated_at = now;
            })?)
        }
        _ => None,
    };

    state
        .metrics
        .assignments_total
        .with_label_values(&[request.source.as_str()])
        .inc();

    info!(
        assignment_id = %assignment.id,
        load_id = %load.id,
        vehicle_id = %vehicle.id,
        source = request.source.as_str(),
        agreed_price = request.agreed_price,
        "load assigned"
    );

    Ok(Resolution {
        assignment,
        load,
        vehicle,
        closed_session,
    })
}

/// The originating offer is accepted; every other open offer on the load loses.
fn settle_competing_offers(
    state: &AppState,
    txn: &WriteTxn<'_>,
    request: &NewAssignment,
) -> Result<(), AppError> {
    let now = state.now();

    for application in state.store.applications_for_load(request.load_id) {
        if Some(application.id) == request.application_id {
            state.store.update_application(txn, application.id, |a| {
                a.status = ApplicationStatus::Accepted;
                a.agreed_price = Some(request.agreed_price);
                a.updated_at = now;
            })?;
        } else if application.status.is_open() {
            state.store.update_application(txn, application.id, |a| {
                a.status = ApplicationStatus::Rejected;
                a.updated_at = now;
            })?;
        }
    }

    for vehicle_request in state.store.vehicle_requests_for_load(request.load_id) {
        let status = if Some(vehicle_request.id) == request.vehicle_request_id {
            OfferStatus::Accepted
        } else if vehicle_request.status == OfferStatus::Pending {
            OfferStatus::Rejected
        } else {
            continue;
        };
        state.store.update_vehicle_request(txn, vehicle_request.id, |r| {
            r.status = status;
            r.updated_at = now;
        })?;
    }

    if let Some(id) = request.transport_request_id {
        state.store.update_transport_request(txn, id, |r| {
            r.status = OfferStatus::Accepted;
            r.updated_at = now;
        })?;
    }

    Ok(())
}

/// Tells both parties and the load's room. Call after the transaction is dropped.
pub fn announce(state: &AppState, resolution: &Resolution) {
    let assignment = &resolution.assignment;

    state
        .notifier
        .publish(Room::Load(assignment.load_id), EventKind::AssignmentStatus, assignment);
    for user_id in [assignment.load_provider_id, assignment.vehicle_owner_id] {
        state
            .notifier
            .publish(Room::User(user_id), EventKind::AssignmentStatus, assignment);
    }

    if let Some(session) = &resolution.closed_session {
        state
            .notifier
            .publish(Room::Bidding(session.id), EventKind::BiddingClosed, session);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Commission {
    pub percent: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminMatch {
    pub load: Load,
    pub vehicle: Vehicle,
    pub assignment: LoadAssignment,
    pub commission: Commission,
}

/// Admin assigns a vehicle to a load directly. When the vehicle has an open
/// application on the load, that application is the one accepted, and its bid
/// price is the default agreed price.
pub fn admin_match(
    state: &AppState,
    caller: &Caller,
    load_id: Uuid,
    vehicle_id: Uuid,
    agreed_price: Option<f64>,
) -> Result<AdminMatch, AppError> {
    caller.require_admin()?;

    let txn = state.store.write();

    let application = state
        .store
        .applications_for_load(load_id)
        .into_iter()
        .find(|a| a.vehicle_id == vehicle_id && a.status.is_open());

    let price = agreed_price
        .or_else(|| application.as_ref().map(|a| a.bid_price))
        .unwrap_or(0.0);

    let mut request = NewAssignment::new(load_id, vehicle_id, price, AssignmentSource::Admin);
    request.application_id = application.map(|a| a.id);

    let resolution = create_assignment(state, &txn, request)?;
    drop(txn);

    announce(state, &resolution);

    let commission = Commission {
        percent: resolution.load.commission_percent,
        amount: resolution.assignment.commission_amount,
    };

    Ok(AdminMatch {
        load: resolution.load,
        vehicle: resolution.vehicle,
        assignment: resolution.assignment,
        commission,
    })
}
