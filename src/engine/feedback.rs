use tracing::info;
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::AppError;
use crate::models::assignment::AssignmentStatus;
use crate::models::feedback::{Message, Rating};
use crate::state::AppState;

pub fn rate_assignment(
    state: &AppState,
    caller: &Caller,
    assignment_id: Uuid,
    score: u8,
    comment: Option<String>,
) -> Result<Rating, AppError> {
    if !(1..=5).contains(&score) {
        return Err(AppError::InvalidInput(
            "score must be between 1 and 5".to_string(),
        ));
    }

    let txn = state.store.write();
    let assignment = state
        .store
        .assignment(assignment_id)
        .filter(|a| a.involves(caller.user_id))
        .ok_or_else(|| AppError::not_found("Assignment"))?;

    if assignment.status != AssignmentStatus::Completed {
        return Err(AppError::InvalidState(
            "Only completed assignments can be rated".to_string(),
        ));
    }

    let by_provider = caller.user_id == assignment.load_provider_id;
    let ratee_id = if by_provider {
        assignment.vehicle_owner_id
    } else {
        assignment.load_provider_id
    };

    let rating = Rating {
        id: Uuid::new_v4(),
        assignment_id,
        rater_id: caller.user_id,
        ratee_id,
        score,
        comment: comment.filter(|c| !c.trim().is_empty()),
        created_at: state.now(),
    };
    state.store.insert_rating(&txn, rating.clone())?;

    if by_provider {
        state
            .store
            .update_vehicle(&txn, assignment.vehicle_id, |vehicle| {
                vehicle.record_rating(score);
            })?;
    }
    drop(txn);

    info!(
        assignment_id = %assignment_id,
        rater_id = %caller.user_id,
        score,
        "assignment rated"
    );
    Ok(rating)
}

/// One side of every message is the load's provider.
pub fn send_message(
    state: &AppState,
    caller: &Caller,
    load_id: Uuid,
    recipient_id: Uuid,
    body: &str,
) -> Result<Message, AppError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(AppError::InvalidInput("Message body cannot be empty".to_string()));
    }
    if recipient_id == caller.user_id {
        return Err(AppError::InvalidInput(
            "You cannot message yourself".to_string(),
        ));
    }

    let load = state
        .store
        .load(load_id)
        .ok_or_else(|| AppError::not_found("Load"))?;
    if state.store.user(recipient_id).is_none() {
        return Err(AppError::not_found("Recipient"));
    }
    if caller.user_id != load.provider_id && recipient_id != load.provider_id {
        return Err(AppError::Forbidden(
            "Messages on a load must involve its provider".to_string(),
        ));
    }

    let message = Message {
        id: Uuid::new_v4(),
        load_id,
        sender_id: caller.user_id,
        recipient_id,
        body: body.to_string(),
        created_at: state.now(),
    };

    let txn = state.store.write();
    state.store.insert_message(&txn, message.clone());
    drop(txn);

    Ok(message)
}

pub fn list_messages(
    state: &AppState,
    caller: &Caller,
    load_id: Uuid,
) -> Result<Vec<Message>, AppError> {
    state
        .store
        .load(load_id)
        .ok_or_else(|| AppError::not_found("Load"))?;
    Ok(state.store.messages_for(load_id, caller.user_id))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{list_messages, rate_assignment, send_message};
    use crate::auth::register_user;
    use crate::engine::assignment::admin_match;
    use crate::engine::fixtures::{
        admin, caller, load, owner_of, provider_of, put_load, put_vehicle, state_at, vehicle,
    };
    use crate::engine::status::update_status;
    use crate::error::AppError;
    use crate::models::assignment::AssignmentStatus;
    use crate::models::user::Role;
    use crate::models::vehicle::VehicleType;

    #[test]
    fn ratings_need_completion_and_are_write_once() {
        let (state, _clock) = state_at(Utc::now());
        let cargo = load(VehicleType::SixWheel, 20, 5_000.0);
        let truck = vehicle(VehicleType::SixWheel, 20, 8.0);
        put_load(&state, &cargo);
        put_vehicle(&state, &truck);

        let matched = admin_match(&state, &admin(), cargo.id, truck.id, Some(9_000.0)).unwrap();
        let id = matched.assignment.id;

        let early = rate_assignment(&state, &provider_of(&cargo), id, 4, None).unwrap_err();
        assert!(matches!(early, AppError::InvalidState(_)));

        update_status(&state, &admin(), id, AssignmentStatus::Completed, None).unwrap();

        let rating = rate_assignment(&state, &provider_of(&cargo), id, 4, None).unwrap();
        assert_eq!(rating.ratee_id, truck.owner_id);
        let again = rate_assignment(&state, &provider_of(&cargo), id, 5, None).unwrap_err();
        assert!(matches!(again, AppError::Conflict(_)));

        let rated = state.store.vehicle(truck.id).unwrap();
        assert_eq!(rated.rating_count, 1);
        assert_eq!(rated.rating, 4.0);

        let bad = rate_assignment(&state, &owner_of(&truck), id, 6, None).unwrap_err();
        assert!(matches!(bad, AppError::InvalidInput(_)));
        assert!(rate_assignment(&state, &owner_of(&truck), id, 5, None).is_ok());
    }

    #[test]
    fn messages_must_involve_the_provider() {
        let (state, clock) = state_at(Utc::now());
        let (provider, _) = register_user(&state, "Asha", Role::LoadProvider, None).unwrap();
        let (owner, _) = register_user(&state, "Ravi", Role::VehicleOwner, None).unwrap();
        let (other, _) = register_user(&state, "Meena", Role::VehicleOwner, None).unwrap();

        let mut cargo = load(VehicleType::FourWheel, 14, 1_000.0);
        cargo.provider_id = provider.id;
        put_load(&state, &cargo);

        let owner_caller = caller(owner.id, Role::VehicleOwner);
        send_message(&state, &owner_caller, cargo.id, provider.id, "Can load on Monday").unwrap();
        clock.advance(Duration::minutes(1));
        send_message(&state, &provider_of(&cargo), cargo.id, owner.id, "Monday works").unwrap();

        let err = send_message(&state, &owner_caller, cargo.id, other.id, "hi").unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let thread = list_messages(&state, &owner_caller, cargo.id).unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].body, "Can load on Monday");

        let outsider = caller(other.id, Role::VehicleOwner);
        assert!(list_messages(&state, &outsider, cargo.id).unwrap().is_empty());
    }
}
