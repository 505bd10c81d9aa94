use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::Caller;
use crate::engine::assignment::{self, NewAssignment};
use crate::engine::matching::require_compatible;
use crate::error::AppError;
use crate::models::assignment::{AssignmentSource, LoadAssignment};
use crate::models::load::Load;
use crate::models::offer::{
    ApplicationStatus, Decision, OfferStatus, VehicleApplication, VehicleRequest,
};
use crate::models::user::Role;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationOutcome {
    pub application: VehicleApplication,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<LoadAssignment>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRequestOutcome {
    pub request: VehicleRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<LoadAssignment>,
}

fn validate_price(price: f64, field: &str) -> Result<(), AppError> {
    if price.is_finite() && price > 0.0 {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!("{field} must be a positive amount")))
    }
}

fn open_load(state: &AppState, load_id: Uuid) -> Result<Load, AppError> {
    let load = state
        .store
        .load(load_id)
        .ok_or_else(|| AppError::not_found("Load"))?;
    if !load.status.is_open() {
        return Err(AppError::InvalidState(
            "Load is no longer accepting offers".to_string(),
        ));
    }
    Ok(load)
}

pub fn apply_for_load(
    state: &AppState,
    caller: &Caller,
    load_id: Uuid,
    vehicle_id: Uuid,
    bid_price: f64,
    message: Option<String>,
) -> Result<VehicleApplication, AppError> {
    caller.require(Role::VehicleOwner)?;
    validate_price(bid_price, "bidPrice")?;

    let txn = state.store.write();
    let vehicle = state
        .store
        .vehicle(vehicle_id)
        .filter(|v| v.owner_id == caller.user_id)
        .ok_or_else(|| AppError::not_found("Vehicle"))?;
    let load = open_load(state, load_id)?;
    require_compatible(&vehicle, &load)?;

    // Loads with XBow support are vetted by an admin before the provider sees them.
    let status = if load.with_xbow_support {
        ApplicationStatus::AdminReview
    } else {
        ApplicationStatus::Pending
    };

    let now = state.now();
    let application = VehicleApplication {
        id: Uuid::new_v4(),
        load_id: load.id,
        vehicle_id: vehicle.id,
        vehicle_owner_id: caller.user_id,
        load_provider_id: load.provider_id,
        bid_price,
        message,
        agreed_price: None,
        status,
        created_at: now,
        updated_at: now,
    };
    state.store.insert_application(&txn, application.clone())?;
    drop(txn);

    info!(
        application_id = %application.id,
        load_id = %load.id,
        vehicle_id = %vehicle.id,
        bid_price,
        "vehicle applied for load"
    );
    Ok(application)
}

pub fn review_application(
    state: &AppState,
    caller: &Caller,
    application_id: Uuid,
    approve: bool,
) -> Result<VehicleApplication, AppError> {
    caller.require_admin()?;

    let txn = state.store.write();
    let application = state
        .store
        .application(application_id)
        .ok_or_else(|| AppError::not_found("Application"))?;

    if application.status != ApplicationStatus::AdminReview {
        return Err(AppError::InvalidState(
            "Application is not awaiting admin review".to_string(),
        ));
    }

    let now = state.now();
    let reviewed = state.store.update_application(&txn, application_id, |a| {
        a.status = if approve {
            ApplicationStatus::AdminApproved
        } else {
            ApplicationStatus::AdminRejected
        };
        a.updated_at = now;
    })?;
    drop(txn);

    info!(application_id = %application_id, approve, "application reviewed");
    Ok(reviewed)
}

pub fn respond_to_application(
    state: &AppState,
    caller: &Caller,
    application_id: Uuid,
    decision: Decision,
    agreed_price: Option<f64>,
) -> Result<ApplicationOutcome, AppError> {
    let txn = state.store.write();
    let application = state
        .store
        .application(application_id)
        .filter(|a| a.load_provider_id == caller.user_id)
        .ok_or_else(|| AppError::not_found("Application"))?;

    if !application.status.awaits_provider() {
        return Err(AppError::InvalidState(
            "Application is not awaiting a response".to_string(),
        ));
    }

    match decision {
        Decision::Rejected => {
            let now = state.now();
            let application = state.store.update_application(&txn, application_id, |a| {
                a.status = ApplicationStatus::Rejected;
                a.updated_at = now;
            })?;
            drop(txn);

            info!(application_id = %application_id, "application rejected");
            Ok(ApplicationOutcome {
                application,
                assignment: None,
            })
        }
        Decision::Accepted => {
            let price = agreed_price.unwrap_or(application.bid_price);
            validate_price(price, "agreedPrice")?;

            let mut request = NewAssignment::new(
                application.load_id,
                application.vehicle_id,
                price,
                AssignmentSource::Application,
            );
            request.application_id = Some(application.id);

            let resolution = assignment::create_assignment(state, &txn, request)?;
            let application = state
                .store
                .application(application_id)
                .ok_or_else(|| AppError::not_found("Application"))?;
            drop(txn);

            assignment::announce(state, &resolution);
            Ok(ApplicationOutcome {
                application,
                assignment: Some(resolution.assignment),
            })
        }
    }
}

pub fn send_vehicle_request(
    state: &AppState,
    caller: &Caller,
    load_id: Uuid,
    vehicle_id: Uuid,
    proposed_price: f64,
    message: Option<String>,
) -> Result<VehicleRequest, AppError> {
    caller.require(Role::LoadProvider)?;
    validate_price(proposed_price, "proposedPrice")?;

    let txn = state.store.write();
    let load = open_load(state, load_id)?;
    if load.provider_id != caller.user_id {
        return Err(AppError::not_found("Load"));
    }
    let vehicle = state
        .store
        .vehicle(vehicle_id)
        .ok_or_else(|| AppError::not_found("Vehicle"))?;
    require_compatible(&vehicle, &load)?;

    let now = state.now();
    let request = VehicleRequest {
        id: Uuid::new_v4(),
        load_id: load.id,
        vehicle_id: vehicle.id,
        load_provider_id: caller.user_id,
        vehicle_owner_id: vehicle.owner_id,
        proposed_price,
        message,
        status: OfferStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    state.store.insert_vehicle_request(&txn, request.clone())?;
    drop(txn);

    info!(
        request_id = %request.id,
        load_id = %load.id,
        vehicle_id = %vehicle.id,
        proposed_price,
        "vehicle requested for load"
    );
    Ok(request)
}

pub fn respond_to_vehicle_request(
    state: &AppState,
    caller: &Caller,
    request_id: Uuid,
    decision: Decision,
) -> Result<VehicleRequestOutcome, AppError> {
    let txn = state.store.write();
    let request = state
        .store
        .vehicle_request(request_id)
        .filter(|r| r.vehicle_owner_id == caller.user_id)
        .ok_or_else(|| AppError::not_found("Vehicle request"))?;

    if request.status != OfferStatus::Pending {
        return Err(AppError::InvalidState(
            "Vehicle request has already been answered".to_string(),
        ));
    }

    match decision {
        Decision::Rejected => {
            let now = state.now();
            let request = state.store.update_vehicle_request(&txn, request_id, |r| {
                r.status = OfferStatus::Rejected;
                r.updated_at = now;
            })?;
            drop(txn);

            info!(request_id = %request_id, "vehicle request rejected");
            Ok(VehicleRequestOutcome {
                request,
                assignment: None,
            })
        }
        Decision::Accepted => {
            let mut new = NewAssignment::new(
                request.load_id,
                request.vehicle_id,
                request.proposed_price,
                AssignmentSource::VehicleRequest,
            );
            new.vehicle_request_id = Some(request.id);

            let resolution = assignment::create_assignment(state, &txn, new)?;
            let request = state
                .store
                .vehicle_request(request_id)
                .ok_or_else(|| AppError::not_found("Vehicle request"))?;
            drop(txn);

            assignment::announce(state, &resolution);
            Ok(VehicleRequestOutcome {
                request,
                assignment: Some(resolution.assignment),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        apply_for_load, respond_to_application, respond_to_vehicle_request, review_application,
        send_vehicle_request,
    };
    use crate::engine::fixtures::{
        admin, date, load, owner_of, provider_of, put_load, put_vehicle, state_at, vehicle,
    };
    use crate::error::AppError;
    use crate::models::assignment::AssignmentSource;
    use crate::models::load::LoadStatus;
    use crate::models::offer::{ApplicationStatus, Decision, OfferStatus};
    use crate::models::vehicle::{VehicleStatus, VehicleType};

    #[test]
    fn accepting_one_application_rejects_the_others() {
        let (state, _clock) = state_at(date(2024, 1, 1));
        let cargo = load(VehicleType::FourWheel, 20, 2_000.0);
        put_load(&state, &cargo);

        let trucks: Vec<_> = (0..3)
            .map(|_| vehicle(VehicleType::FourWheel, 20, 3.0))
            .collect();
        let applications: Vec<_> = trucks
            .iter()
            .enumerate()
            .map(|(i, truck)| {
                put_vehicle(&state, truck);
                apply_for_load(&state, &owner_of(truck), cargo.id, truck.id, 4000.0 + i as f64, None)
                    .unwrap()
            })
            .collect();

        let outcome = respond_to_application(
            &state,
            &provider_of(&cargo),
            applications[1].id,
            Decision::Accepted,
            None,
        )
        .unwrap();

        assert_eq!(outcome.application.status, ApplicationStatus::Accepted);
        let assignment = outcome.assignment.unwrap();
        assert_eq!(assignment.agreed_price, 4001.0);
        assert_eq!(assignment.application_id, Some(applications[1].id));
        assert_eq!(assignment.source, AssignmentSource::Application);

        for other in [&applications[0], &applications[2]] {
            let stored = state.store.application(other.id).unwrap();
            assert_eq!(stored.status, ApplicationStatus::Rejected);
        }

        assert_eq!(state.store.load(cargo.id).unwrap().status, LoadStatus::Assigned);
        assert_eq!(
            state.store.vehicle(trucks[1].id).unwrap().status,
            VehicleStatus::Assigned
        );
    }

    #[test]
    fn incompatible_vehicle_cannot_apply() {
        let (state, _clock) = state_at(date(2024, 1, 1));
        let cargo = load(VehicleType::FourWheel, 20, 12_000.0);
        let truck = vehicle(VehicleType::FourWheel, 20, 10.0);
        put_load(&state, &cargo);
        put_vehicle(&state, &truck);

        let err = apply_for_load(&state, &owner_of(&truck), cargo.id, truck.id, 5000.0, None)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(msg) if msg.contains("passing limit")));
    }

    #[test]
    fn second_application_for_same_pair_conflicts() {
        let (state, _clock) = state_at(date(2024, 1, 1));
        let cargo = load(VehicleType::FourWheel, 20, 2_000.0);
        let truck = vehicle(VehicleType::FourWheel, 20, 3.0);
        put_load(&state, &cargo);
        put_vehicle(&state, &truck);

        apply_for_load(&state, &owner_of(&truck), cargo.id, truck.id, 5000.0, None).unwrap();
        let err = apply_for_load(&state, &owner_of(&truck), cargo.id, truck.id, 4500.0, None)
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn xbow_loads_need_admin_approval_before_acceptance() {
        let (state, _clock) = state_at(date(2024, 1, 1));
        let mut cargo = load(VehicleType::FourWheel, 20, 2_000.0);
        cargo.with_xbow_support = true;
        cargo.commission_percent = 5.0;
        let truck = vehicle(VehicleType::FourWheel, 20, 3.0);
        put_load(&state, &cargo);
        put_vehicle(&state, &truck);

        let application =
            apply_for_load(&state, &owner_of(&truck), cargo.id, truck.id, 10_000.0, None)
                .unwrap();
        assert_eq!(application.status, ApplicationStatus::AdminReview);

        let early = respond_to_application(
            &state,
            &provider_of(&cargo),
            application.id,
            Decision::Accepted,
            None,
        )
        .unwrap_err();
        assert!(matches!(early, AppError::InvalidState(_)));

        let reviewed = review_application(&state, &admin(), application.id, true).unwrap();
        assert_eq!(reviewed.status, ApplicationStatus::AdminApproved);

        let outcome = respond_to_application(
            &state,
            &provider_of(&cargo),
            application.id,
            Decision::Accepted,
            None,
        )
        .unwrap();
        let assignment = outcome.assignment.unwrap();
        assert_eq!(assignment.commission_amount, 500.0);
    }

    #[test]
    fn accepted_vehicle_request_uses_proposed_price() {
        let (state, _clock) = state_at(date(2024, 1, 1));
        let cargo = load(VehicleType::SixWheel, 22, 4_000.0);
        let truck = vehicle(VehicleType::SixWheel, 24, 6.0);
        put_load(&state, &cargo);
        put_vehicle(&state, &truck);

        let request =
            send_vehicle_request(&state, &provider_of(&cargo), cargo.id, truck.id, 7_500.0, None)
                .unwrap();
        assert_eq!(request.vehicle_owner_id, truck.owner_id);

        let outcome =
            respond_to_vehicle_request(&state, &owner_of(&truck), request.id, Decision::Accepted)
                .unwrap();
        assert_eq!(outcome.request.status, OfferStatus::Accepted);
        let assignment = outcome.assignment.unwrap();
        assert_eq!(assignment.agreed_price, 7_500.0);
        assert_eq!(assignment.source, AssignmentSource::VehicleRequest);
        assert_eq!(assignment.application_id, None);
    }

    #[test]
    fn only_the_invited_owner_can_answer_a_request() {
        let (state, _clock) = state_at(date(2024, 1, 1));
        let cargo = load(VehicleType::FourWheel, 20, 2_000.0);
        let truck = vehicle(VehicleType::FourWheel, 20, 3.0);
        let stranger = vehicle(VehicleType::FourWheel, 20, 3.0);
        put_load(&state, &cargo);
        put_vehicle(&state, &truck);

        let request =
            send_vehicle_request(&state, &provider_of(&cargo), cargo.id, truck.id, 3_000.0, None)
                .unwrap();
        let err = respond_to_vehicle_request(
            &state,
            &owner_of(&stranger),
            request.id,
            Decision::Accepted,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
