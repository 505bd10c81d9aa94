//! `assigned -> enroute -> delivered -> completed`, with the load and vehicle
//! following the assignment.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::AppError;
use crate::models::assignment::{AssignmentNote, AssignmentStatus, LoadAssignment};
use crate::models::load::LoadStatus;
use crate::models::vehicle::VehicleStatus;
use crate::notify::{EventKind, Room};
use crate::state::AppState;

const LIFECYCLE: [AssignmentStatus; 4] = [
    AssignmentStatus::Assigned,
    AssignmentStatus::Enroute,
    AssignmentStatus::Delivered,
    AssignmentStatus::Completed,
];

impl AssignmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::Enroute => "enroute",
            AssignmentStatus::Delivered => "delivered",
            AssignmentStatus::Completed => "completed",
        }
    }
}

/// Statuses passed through when moving `from -> to`, in order. Empty when the
/// assignment is already there. Skipping a step is only allowed with
/// `allow_skip`; moving backwards never is.
pub fn plan_transition(
    from: AssignmentStatus,
    to: AssignmentStatus,
    allow_skip: bool,
) -> Result<Vec<AssignmentStatus>, AppError> {
    if to == from {
        return Ok(Vec::new());
    }
    if from == AssignmentStatus::Completed {
        return Err(AppError::InvalidState(
            "Assignment is already completed".to_string(),
        ));
    }
    if to < from {
        return Err(AppError::InvalidState(format!(
            "Assignment cannot move from {} back to {}",
            from.as_str(),
            to.as_str()
        )));
    }

    let steps: Vec<AssignmentStatus> = LIFECYCLE
        .iter()
        .copied()
        .filter(|status| *status > from && *status <= to)
        .collect();

    if steps.len() > 1 && !allow_skip {
        return Err(AppError::InvalidState(format!(
            "Assignment must be {} before it can be {}",
            steps[steps.len() - 2].as_str(),
            to.as_str()
        )));
    }

    Ok(steps)
}

pub fn load_status_for(status: AssignmentStatus) -> LoadStatus {
    match status {
        AssignmentStatus::Assigned => LoadStatus::Assigned,
        AssignmentStatus::Enroute => LoadStatus::Enroute,
        AssignmentStatus::Delivered => LoadStatus::Delivered,
        AssignmentStatus::Completed => LoadStatus::Completed,
    }
}

/// The vehicle is released once the shipment is completed.
pub fn vehicle_status_for(status: AssignmentStatus) -> VehicleStatus {
    match status {
        AssignmentStatus::Assigned => VehicleStatus::Assigned,
        AssignmentStatus::Enroute => VehicleStatus::InTransit,
        AssignmentStatus::Delivered => VehicleStatus::Delivered,
        AssignmentStatus::Completed => VehicleStatus::Available,
    }
}

fn stamp(assignment: &mut LoadAssignment, status: AssignmentStatus, now: DateTime<Utc>) {
    let slot = match status {
        AssignmentStatus::Assigned => return,
        AssignmentStatus::Enroute => &mut assignment.started_at,
        AssignmentStatus::Delivered => &mut assignment.delivered_at,
        AssignmentStatus::Completed => &mut assignment.completed_at,
    };
    if slot.is_none() {
        *slot = Some(now);
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusChanged<'a> {
    assignment: &'a LoadAssignment,
    previous_status: AssignmentStatus,
}

/// Moves an assignment forward one step (admins may skip steps). Provider,
/// owner and admin may call it.
pub fn update_status(
    state: &AppState,
    caller: &Caller,
    assignment_id: Uuid,
    to: AssignmentStatus,
    note: Option<String>,
) -> Result<LoadAssignment, AppError> {
    let txn = state.store.write();
    let current = state
        .store
        .assignment(assignment_id)
        .ok_or_else(|| AppError::not_found("Assignment"))?;

    if !caller.is_admin() && !current.involves(caller.user_id) {
        return Err(AppError::Forbidden(
            "You are not a participant in this assignment".to_string(),
        ));
    }

    let steps = plan_transition(current.status, to, caller.is_admin())?;
    let updated = apply_steps(state, &txn, &current, &steps, caller, note)?;
    drop(txn);

    announce(state, &current, &updated, &steps);
    Ok(updated)
}

/// Completion requires a delivered assignment. Provider or admin only.
pub fn complete(
    state: &AppState,
    caller: &Caller,
    assignment_id: Uuid,
) -> Result<LoadAssignment, AppError> {
    let txn = state.store.write();
    let current = state
        .store
        .assignment(assignment_id)
        .ok_or_else(|| AppError::not_found("Assignment"))?;

    if !caller.is_admin() && current.load_provider_id != caller.user_id {
        return Err(AppError::Forbidden(
            "Only the load provider can complete this assignment".to_string(),
        ));
    }
    if current.status != AssignmentStatus::Delivered {
        return Err(AppError::InvalidState(
            "Assignment must be delivered before it can be completed".to_string(),
        ));
    }

    let steps = plan_transition(current.status, AssignmentStatus::Completed, false)?;
    let updated = apply_steps(state, &txn, &current, &steps, caller, None)?;
    drop(txn);

    announce(state, &current, &updated, &steps);
    Ok(updated)
}

fn apply_steps(
    state: &AppState,
    txn: &crate::store::WriteTxn<'_>,
    current: &LoadAssignment,
    steps: &[AssignmentStatus],
    caller: &Caller,
    note: Option<String>,
) -> Result<LoadAssignment, AppError> {
    let now = state.now();
    let note = note
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    if steps.is_empty() && note.is_none() {
        return Ok(current.clone());
    }

    let target = steps.last().copied();

    let updated = state.store.update_assignment(txn, current.id, |assignment| {
        for status in steps {
            stamp(assignment, *status, now);
        }
        if let Some(status) = target {
            assignment.status = status;
        }
        if let Some(text) = note {
            assignment.notes.push(AssignmentNote {
                author_id: caller.user_id,
                text,
                at: now,
            });
        }
        assignment.updated_at = now;
    })?;

    if let Some(status) = target {
        state.store.update_load(txn, current.load_id, |load| {
            load.status = load_status_for(status);
            load.updated_at = now;
        })?;
        state.store.update_vehicle(txn, current.vehicle_id, |vehicle| {
            vehicle.status = vehicle_status_for(status);
            vehicle.updated_at = now;
        })?;

        state
            .metrics
            .status_transitions_total
            .with_label_values(&[status.as_str()])
            .inc();

        info!(
            assignment_id = %current.id,
            load_id = %current.load_id,
            vehicle_id = %current.vehicle_id,
            from = current.status.as_str(),
            to = status.as_str(),
            "assignment status changed"
        );
    }

    Ok(updated)
}

fn announce(
    state: &AppState,
    previous: &LoadAssignment,
    updated: &LoadAssignment,
    steps: &[AssignmentStatus],
) {
    if steps.is_empty() {
        return;
    }

    if steps.contains(&AssignmentStatus::Enroute) {
        state.notifier.publish(
            Room::User(updated.load_provider_id),
            EventKind::JourneyStarted,
            updated,
        );
        state.notifier.publish(
            Room::Load(updated.load_id),
            EventKind::JourneyStarted,
            updated,
        );
    }

    state.notifier.publish(
        Room::Load(updated.load_id),
        EventKind::AssignmentStatus,
        &StatusChanged {
            assignment: updated,
            previous_status: previous.status,
        },
    );
}
