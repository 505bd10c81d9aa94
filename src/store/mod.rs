//! DashMap entity store. Writes need a [`WriteTxn`]; unique indexes are
//! enforced here.

use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::LoadAssignment;
use crate::models::bidding::{Bid, BiddingSession, TransportRequest};
use crate::models::feedback::{Message, Rating};
use crate::models::load::Load;
use crate::models::offer::{VehicleApplication, VehicleRequest};
use crate::models::user::User;
use crate::models::vehicle::{normalize_registration, Vehicle};

/// Proof that the caller holds the store's write lock.
pub struct WriteTxn<'a> {
    _guard: MutexGuard<'a, ()>,
}

#[derive(Default)]
pub struct Store {
    users: DashMap<Uuid, User>,
    loads: DashMap<Uuid, Load>,
    vehicles: DashMap<Uuid, Vehicle>,
    applications: DashMap<Uuid, VehicleApplication>,
    vehicle_requests: DashMap<Uuid, VehicleRequest>,
    sessions: DashMap<Uuid, BiddingSession>,
    bids: DashMap<Uuid, Bid>,
    transport_requests: DashMap<Uuid, TransportRequest>,
    assignments: DashMap<Uuid, LoadAssignment>,
    ratings: DashMap<Uuid, Rating>,
    messages: DashMap<Uuid, Message>,

    vehicles_by_registration: DashMap<String, Uuid>,
    // (vehicle_id, load_id)
    applications_by_pair: DashMap<(Uuid, Uuid), Uuid>,
    // (load_id, vehicle_id)
    requests_by_pair: DashMap<(Uuid, Uuid), Uuid>,
    sessions_by_load: DashMap<Uuid, Uuid>,
    // (session_id, vehicle_owner_id)
    bids_by_owner: DashMap<(Uuid, Uuid), Uuid>,
    // (load_id, vehicle_id)
    transport_requests_by_pair: DashMap<(Uuid, Uuid), Uuid>,
    assignments_by_load: DashMap<Uuid, Uuid>,
    // (assignment_id, rater_id)
    ratings_by_rater: DashMap<(Uuid, Uuid), Uuid>,

    write_lock: Mutex<()>,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct StoreCounts {
    pub users: usize,
    pub loads: usize,
    pub vehicles: usize,
    pub sessions: usize,
    pub assignments: usize,
}

fn claim<K: Eq + Hash>(
    index: &DashMap<K, Uuid>,
    key: K,
    id: Uuid,
    conflict: &str,
) -> Result<(), AppError> {
    match index.entry(key) {
        Entry::Occupied(_) => Err(AppError::Conflict(conflict.to_string())),
        Entry::Vacant(slot) => {
            slot.insert(id);
            Ok(())
        }
    }
}

fn cloned<V: Clone>(map: &DashMap<Uuid, V>, id: &Uuid) -> Option<V> {
    map.get(id).map(|entry| entry.value().clone())
}

fn modify<V: Clone>(
    map: &DashMap<Uuid, V>,
    id: &Uuid,
    what: &str,
    f: impl FnOnce(&mut V),
) -> Result<V, AppError> {
    let mut entry = map.get_mut(id).ok_or_else(|| AppError::not_found(what))?;
    f(entry.value_mut());
    Ok(entry.value().clone())
}

fn collect<V: Clone>(map: &DashMap<Uuid, V>, keep: impl Fn(&V) -> bool) -> Vec<V> {
    map.iter()
        .filter(|entry| keep(entry.value()))
        .map(|entry| entry.value().clone())
        .collect()
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self) -> WriteTxn<'_> {
        // The lock guards no data, so a poisoned lock is still usable.
        let guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        WriteTxn { _guard: guard }
    }

    pub fn counts(&self) -> StoreCounts {
        StoreCounts {
            users: self.users.len(),
            loads: self.loads.len(),
            vehicles: self.vehicles.len(),
            sessions: self.sessions.len(),
            assignments: self.assignments.len(),
        }
    }

    // users

    pub fn insert_user(&self, _txn: &WriteTxn<'_>, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn user(&self, id: Uuid) -> Option<User> {
        cloned(&self.users, &id)
    }

    // loads

    pub fn insert_load(&self, _txn: &WriteTxn<'_>, load: Load) {
        self.loads.insert(load.id, load);
    }

    /// Loads that have been soft-deleted are not returned.
    pub fn load(&self, id: Uuid) -> Option<Load> {
        cloned(&self.loads, &id).filter(|load| !load.is_deleted)
    }

    pub fn update_load(
        &self,
        _txn: &WriteTxn<'_>,
        id: Uuid,
        f: impl FnOnce(&mut Load),
    ) -> Result<Load, AppError> {
        modify(&self.loads, &id, "Load", f)
    }

    // vehicles

    pub fn insert_vehicle(&self, _txn: &WriteTxn<'_>, vehicle: Vehicle) -> Result<(), AppError> {
        claim(
            &self.vehicles_by_registration,
            normalize_registration(&vehicle.registration_number),
            vehicle.id,
            "A vehicle with this registration number already exists",
        )?;
        self.vehicles.insert(vehicle.id, vehicle);
        Ok(())
    }

    pub fn vehicle(&self, id: Uuid) -> Option<Vehicle> {
        cloned(&self.vehicles, &id)
    }

    pub fn vehicles(&self) -> Vec<Vehicle> {
        collect(&self.vehicles, |_| true)
    }

    pub fn vehicles_owned_by(&self, owner_id: Uuid) -> Vec<Vehicle> {
        collect(&self.vehicles, |v| v.owner_id == owner_id)
    }

    pub fn update_vehicle(
        &self,
        _txn: &WriteTxn<'_>,
        id: Uuid,
        f: impl FnOnce(&mut Vehicle),
    ) -> Result<Vehicle, AppError> {
        modify(&self.vehicles, &id, "Vehicle", f)
    }

    // applications

    pub fn insert_application(
        &self,
        _txn: &WriteTxn<'_>,
        application: VehicleApplication,
    ) -> Result<(), AppError> {
        claim(
            &self.applications_by_pair,
            (application.vehicle_id, application.load_id),
            application.id,
            "This vehicle has already applied for this load",
        )?;
        self.applications.insert(application.id, application);
        Ok(())
    }

    pub fn application(&self, id: Uuid) -> Option<VehicleApplication> {
        cloned(&self.applications, &id)
    }

    pub fn applications_for_load(&self, load_id: Uuid) -> Vec<VehicleApplication> {
        collect(&self.applications, |a| a.load_id == load_id)
    }

    pub fn update_application(
        &self,
        _txn: &WriteTxn<'_>,
        id: Uuid,
        f: impl FnOnce(&mut VehicleApplication),
    ) -> Result<VehicleApplication, AppError> {
        modify(&self.applications, &id, "Application", f)
    }

    // vehicle requests

    pub fn insert_vehicle_request(
        &self,
        _txn: &WriteTxn<'_>,
        request: VehicleRequest,
    ) -> Result<(), AppError> {
        claim(
            &self.requests_by_pair,
            (request.load_id, request.vehicle_id),
            request.id,
            "A request for this vehicle and load already exists",
        )?;
        self.vehicle_requests.insert(request.id, request);
        Ok(())
    }

    pub fn vehicle_request(&self, id: Uuid) -> Option<VehicleRequest> {
        cloned(&self.vehicle_requests, &id)
    }

    pub fn vehicle_requests_for_load(&self, load_id: Uuid) -> Vec<VehicleRequest> {
        collect(&self.vehicle_requests, |r| r.load_id == load_id)
    }

    pub fn update_vehicle_request(
        &self,
        _txn: &WriteTxn<'_>,
        id: Uuid,
        f: impl FnOnce(&mut VehicleRequest),
    ) -> Result<VehicleRequest, AppError> {
        modify(&self.vehicle_requests, &id, "Vehicle request", f)
    }

    // bidding sessions

    pub fn insert_session(
        &self,
        _txn: &WriteTxn<'_>,
        session: BiddingSession,
    ) -> Result<(), AppError> {
        claim(
            &self.sessions_by_load,
            session.load_id,
            session.id,
            "A bidding session already exists for this load",
        )?;
        self.sessions.insert(session.id, session);
        Ok(())
    }

    pub fn session(&self, id: Uuid) -> Option<BiddingSession> {
        cloned(&self.sessions, &id)
    }

    pub fn session_for_load(&self, load_id: Uuid) -> Option<BiddingSession> {
        let id = *self.sessions_by_load.get(&load_id)?.value();
        self.session(id)
    }

    pub fn sessions(&self) -> Vec<BiddingSession> {
        collect(&self.sessions, |_| true)
    }

    pub fn update_session(
        &self,
        _txn: &WriteTxn<'_>,
        id: Uuid,
        f: impl FnOnce(&mut BiddingSession),
    ) -> Result<BiddingSession, AppError> {
        modify(&self.sessions, &id, "Bidding session", f)
    }

    // bids

    pub fn insert_bid(&self, _txn: &WriteTxn<'_>, bid: Bid) -> Result<(), AppError> {
        claim(
            &self.bids_by_owner,
            (bid.bidding_session_id, bid.vehicle_owner_id),
            bid.id,
            "You have already placed a bid in this session",
        )?;
        self.bids.insert(bid.id, bid);
        Ok(())
    }

    pub fn bid(&self, id: Uuid) -> Option<Bid> {
        cloned(&self.bids, &id)
    }

    pub fn bid_by_owner(&self, session_id: Uuid, owner_id: Uuid) -> Option<Bid> {
        let id = *self.bids_by_owner.get(&(session_id, owner_id))?.value();
        self.bid(id)
    }

    pub fn bids_for_session(&self, session_id: Uuid) -> Vec<Bid> {
        collect(&self.bids, |b| b.bidding_session_id == session_id)
    }

    pub fn update_bid(
        &self,
        _txn: &WriteTxn<'_>,
        id: Uuid,
        f: impl FnOnce(&mut Bid),
    ) -> Result<Bid, AppError> {
        modify(&self.bids, &id, "Bid", f)
    }

    // transport requests

    pub fn insert_transport_request(
        &self,
        _txn: &WriteTxn<'_>,
        request: TransportRequest,
    ) -> Result<(), AppError> {
        claim(
            &self.transport_requests_by_pair,
            (request.load_id, request.vehicle_id),
            request.id,
            "A transport request for this vehicle and load already exists",
        )?;
        self.transport_requests.insert(request.id, request);
        Ok(())
    }

    pub fn transport_request(&self, id: Uuid) -> Option<TransportRequest> {
        cloned(&self.transport_requests, &id)
    }

    pub fn has_transport_request(&self, load_id: Uuid, vehicle_id: Uuid) -> bool {
        self.transport_requests_by_pair
            .contains_key(&(load_id, vehicle_id))
    }

    pub fn update_transport_request(
        &self,
        _txn: &WriteTxn<'_>,
        id: Uuid,
        f: impl FnOnce(&mut TransportRequest),
    ) -> Result<TransportRequest, AppError> {
        modify(&self.transport_requests, &id, "Transport request", f)
    }

    // assignments

    pub fn insert_assignment(
        &self,
        _txn: &WriteTxn<'_>,
        assignment: LoadAssignment,
    ) -> Result<(), AppError> {
        claim(
            &self.assignments_by_load,
            assignment.load_id,
            assignment.id,
            "Load already has an assignment",
        )?;
        self.assignments.insert(assignment.id, assignment);
        Ok(())
    }

    pub fn assignment(&self, id: Uuid) -> Option<LoadAssignment> {
        cloned(&self.assignments, &id)
    }

    pub fn assignment_for_load(&self, load_id: Uuid) -> Option<LoadAssignment> {
        let id = *self.assignments_by_load.get(&load_id)?.value();
        self.assignment(id)
    }

    pub fn update_assignment(
        &self,
        _txn: &WriteTxn<'_>,
        id: Uuid,
        f: impl FnOnce(&mut LoadAssignment),
    ) -> Result<LoadAssignment, AppError> {
        modify(&self.assignments, &id, "Assignment", f)
    }

    // feedback

    pub fn insert_rating(&self, _txn: &WriteTxn<'_>, rating: Rating) -> Result<(), AppError> {
        claim(
            &self.ratings_by_rater,
            (rating.assignment_id, rating.rater_id),
            rating.id,
            "You have already rated this assignment",
        )?;
        self.ratings.insert(rating.id, rating);
        Ok(())
    }

    pub fn insert_message(&self, _txn: &WriteTxn<'_>, message: Message) {
        self.messages.insert(message.id, message);
    }

    /// Messages on a load exchanged with `participant`, oldest first.
    pub fn messages_for(&self, load_id: Uuid, participant: Uuid) -> Vec<Message> {
        let mut messages = collect(&self.messages, |m| {
            m.load_id == load_id && (m.sender_id == participant || m.recipient_id == participant)
        });
        messages.sort_by_key(|m| m.created_at);
        messages
    }
}
