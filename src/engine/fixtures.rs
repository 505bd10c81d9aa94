//! Builders shared by the engine's unit tests.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::Caller;
use crate::clock::ManualClock;
use crate::config::Config;
use crate::models::common::{Dimensions, GeoPoint, Location, OperatingArea};
use crate::models::load::{Load, LoadStatus, Material, PaymentTerms, VehicleRequirement};
use crate::models::user::Role;
use crate::models::vehicle::{BodyType, TrailerType, Vehicle, VehicleStatus, VehicleType};
use crate::notify::RoomEvent;
use crate::state::AppState;

pub fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

pub fn location(state: &str, district: &str, coordinates: Option<GeoPoint>) -> Location {
    Location {
        pincode: "560001".to_string(),
        state: state.to_string(),
        district: district.to_string(),
        place: "Depot".to_string(),
        coordinates,
    }
}

pub fn material(total_weight_kg: f64) -> Material {
    Material {
        name: "cement".to_string(),
        dimensions: Dimensions {
            length: 1.0,
            width: 1.0,
            height: 1.0,
        },
        pack_type: "bags".to_string(),
        count: 1,
        unit_weight: total_weight_kg,
        total_weight: total_weight_kg,
        photos: Vec::new(),
    }
}

pub fn load(vehicle_type: VehicleType, size: u32, total_weight_kg: f64) -> Load {
    Load {
        id: Uuid::new_v4(),
        provider_id: Uuid::new_v4(),
        pickup: location("Karnataka", "Bengaluru", Some(GeoPoint { lat: 12.97, lng: 77.59 })),
        drop: location("Tamil Nadu", "Chennai", Some(GeoPoint { lat: 13.08, lng: 80.27 })),
        vehicle_requirement: VehicleRequirement {
            vehicle_type,
            size,
            trailer_type: None,
        },
        materials: vec![material(total_weight_kg)],
        loading_date: date(2024, 2, 1),
        loading_time: None,
        payment_terms: PaymentTerms::Advance,
        with_xbow_support: false,
        commission_percent: 0.0,
        status: LoadStatus::Posted,
        assigned_vehicle_id: None,
        is_deleted: false,
        created_at: date(2024, 1, 1),
        updated_at: date(2024, 1, 1),
    }
}

pub fn vehicle(vehicle_type: VehicleType, size: u32, passing_limit_tons: f64) -> Vehicle {
    Vehicle {
        id: Uuid::new_v4(),
        owner_id: Uuid::new_v4(),
        vehicle_type,
        vehicle_size: size,
        vehicle_weight: 3.0,
        passing_limit: passing_limit_tons,
        dimensions: Dimensions {
            length: f64::from(size),
            width: 7.0,
            height: 7.0,
        },
        registration_number: format!("KA01{}", Uuid::new_v4().simple()),
        availability: date(2024, 1, 15),
        body_type: BodyType::Open,
        has_tarpaulin: true,
        trailer_type: TrailerType::None,
        operating_areas: vec![OperatingArea {
            state: "Karnataka".to_string(),
            district: "Bengaluru".to_string(),
            place: None,
        }],
        location: Some(GeoPoint { lat: 12.95, lng: 77.60 }),
        photos: Vec::new(),
        status: VehicleStatus::Available,
        is_approved: true,
        rejection_reason: None,
        rating: 0.0,
        rating_count: 0,
        created_at: date(2024, 1, 1),
        updated_at: date(2024, 1, 1),
    }
}

pub fn state_at(now: DateTime<Utc>) -> (AppState, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(now));
    let state = AppState::with_clock(&Config::default(), clock.clone());
    (state, clock)
}

pub fn caller(user_id: Uuid, role: Role) -> Caller {
    Caller { user_id, role }
}

pub fn admin() -> Caller {
    caller(Uuid::new_v4(), Role::Admin)
}

pub fn provider_of(load: &Load) -> Caller {
    caller(load.provider_id, Role::LoadProvider)
}

pub fn owner_of(vehicle: &Vehicle) -> Caller {
    caller(vehicle.owner_id, Role::VehicleOwner)
}

pub fn put_load(state: &AppState, load: &Load) {
    let txn = state.store.write();
    state.store.insert_load(&txn, load.clone());
}

pub fn put_vehicle(state: &AppState, vehicle: &Vehicle) {
    let txn = state.store.write();
    state.store.insert_vehicle(&txn, vehicle.clone()).unwrap();
}

/// Everything published since the last drain.
pub fn drain(events: &mut broadcast::Receiver<RoomEvent>) -> Vec<RoomEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}
