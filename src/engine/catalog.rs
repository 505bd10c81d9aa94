use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::Caller;
use crate::engine::matching;
use crate::engine::scoring::{self, RankedVehicle};
use crate::error::AppError;
use crate::models::common::{Dimensions, GeoPoint, Location, OperatingArea, Photo};
use crate::models::load::{
    Load, LoadStatus, Material, PaymentTerms, VehicleRequirement, MAX_MATERIALS,
};
use crate::models::user::Role;
use crate::models::vehicle::{
    normalize_registration, BodyType, TrailerType, Vehicle, VehicleStatus, VehicleType,
    VEHICLE_SIZES_FT,
};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMaterial {
    pub name: String,
    pub dimensions: Dimensions,
    pub pack_type: String,
    pub count: u32,
    pub unit_weight: f64,
    /// Defaults to `count * unitWeight`.
    #[serde(default)]
    pub total_weight: Option<f64>,
    #[serde(default)]
    pub photos: Vec<Photo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLoad {
    pub pickup: Location,
    pub drop: Location,
    pub vehicle_requirement: VehicleRequirement,
    pub materials: Vec<NewMaterial>,
    pub loading_date: DateTime<Utc>,
    #[serde(default)]
    pub loading_time: Option<String>,
    pub payment_terms: PaymentTerms,
    #[serde(default, rename = "withXBowSupport")]
    pub with_xbow_support: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVehicle {
    pub vehicle_type: VehicleType,
    pub vehicle_size: u32,
    pub vehicle_weight: f64,
    pub passing_limit: f64,
    pub dimensions: Dimensions,
    pub registration_number: String,
    pub availability: DateTime<Utc>,
    pub body_type: BodyType,
    #[serde(default)]
    pub has_tarpaulin: bool,
    #[serde(default)]
    pub trailer_type: TrailerType,
    #[serde(default)]
    pub operating_areas: Vec<OperatingArea>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub photos: Vec<Photo>,
}

fn positive(value: f64, field: &str) -> Result<(), AppError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!("{field} must be positive")))
    }
}

fn build_material(input: NewMaterial) -> Result<Material, AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::InvalidInput("Material name is required".to_string()));
    }
    if input.count == 0 {
        return Err(AppError::InvalidInput(
            "Material count must be at least 1".to_string(),
        ));
    }
    positive(input.unit_weight, "unitWeight")?;

    let total_weight = input
        .total_weight
        .unwrap_or(f64::from(input.count) * input.unit_weight);
    positive(total_weight, "totalWeight")?;

    Ok(Material {
        name: input.name.trim().to_string(),
        dimensions: input.dimensions,
        pack_type: input.pack_type,
        count: input.count,
        unit_weight: input.unit_weight,
        total_weight,
        photos: input.photos,
    })
}

pub fn create_load(state: &AppState, caller: &Caller, input: NewLoad) -> Result<Load, AppError> {
    caller.require(Role::LoadProvider)?;

    if input.materials.is_empty() || input.materials.len() > MAX_MATERIALS {
        return Err(AppError::InvalidInput(format!(
            "A load must have between 1 and {MAX_MATERIALS} materials"
        )));
    }
    if !VEHICLE_SIZES_FT.contains(&input.vehicle_requirement.size) {
        return Err(AppError::InvalidInput(format!(
            "Vehicle size must be one of {VEHICLE_SIZES_FT:?} ft"
        )));
    }

    let materials = input
        .materials
        .into_iter()
        .map(build_material)
        .collect::<Result<Vec<_>, _>>()?;

    let commission_percent = if input.with_xbow_support {
        state.settings.xbow_commission_percent
    } else {
        0.0
    };

    let now = state.now();
    let load = Load {
        id: Uuid::new_v4(),
        provider_id: caller.user_id,
        pickup: input.pickup,
        drop: input.drop,
        vehicle_requirement: input.vehicle_requirement,
        materials,
        loading_date: input.loading_date,
        loading_time: input.loading_time,
        payment_terms: input.payment_terms,
        with_xbow_support: input.with_xbow_support,
        commission_percent,
        status: LoadStatus::Posted,
        assigned_vehicle_id: None,
        is_deleted: false,
        created_at: now,
        updated_at: now,
    };

    let txn = state.store.write();
    state.store.insert_load(&txn, load.clone());
    drop(txn);

    info!(
        load_id = %load.id,
        provider_id = %caller.user_id,
        weight_tons = load.total_weight_tons(),
        "load posted"
    );
    Ok(load)
}

pub fn get_load(state: &AppState, load_id: Uuid) -> Result<Load, AppError> {
    state
        .store
        .load(load_id)
        .ok_or_else(|| AppError::not_found("Load"))
}

/// Soft delete; only loads nobody has engaged with yet.
pub fn delete_load(state: &AppState, caller: &Caller, load_id: Uuid) -> Result<Load, AppError> {
    let txn = state.store.write();
    let load = get_load(state, load_id)?;

    if !caller.is_admin() && load.provider_id != caller.user_id {
        return Err(AppError::Forbidden(
            "Only the load provider can delete this load".to_string(),
        ));
    }
    if load.status != LoadStatus::Posted {
        return Err(AppError::InvalidState(
            "Only posted loads can be deleted".to_string(),
        ));
    }

    let now = state.now();
    let load = state.store.update_load(&txn, load_id, |load| {
        load.is_deleted = true;
        load.updated_at = now;
    })?;
    drop(txn);

    info!(load_id = %load_id, "load deleted");
    Ok(load)
}

/// Compatible vehicles for a load, best first.
pub fn candidates(
    state: &AppState,
    caller: &Caller,
    load_id: Uuid,
) -> Result<Vec<RankedVehicle>, AppError> {
    let load = get_load(state, load_id)?;
    if !caller.is_admin() && load.provider_id != caller.user_id {
        return Err(AppError::Forbidden(
            "Only the load provider can view candidates".to_string(),
        ));
    }
    let compatible = matching::find_candidates(&load, state.store.vehicles());
    Ok(scoring::rank(&load, compatible))
}

pub fn create_vehicle(
    state: &AppState,
    caller: &Caller,
    input: NewVehicle,
) -> Result<Vehicle, AppError> {
    caller.require(Role::VehicleOwner)?;

    if !VEHICLE_SIZES_FT.contains(&input.vehicle_size) {
        return Err(AppError::InvalidInput(format!(
            "Vehicle size must be one of {VEHICLE_SIZES_FT:?} ft"
        )));
    }
    positive(input.passing_limit, "passingLimit")?;
    positive(input.vehicle_weight, "vehicleWeight")?;

    let registration_number = normalize_registration(&input.registration_number);
    if registration_number.is_empty() {
        return Err(AppError::InvalidInput(
            "registrationNumber is required".to_string(),
        ));
    }

    let now = state.now();
    let vehicle = Vehicle {
        id: Uuid::new_v4(),
        owner_id: caller.user_id,
        vehicle_type: input.vehicle_type,
        vehicle_size: input.vehicle_size,
        vehicle_weight: input.vehicle_weight,
        passing_limit: input.passing_limit,
        dimensions: input.dimensions,
        registration_number,
        availability: input.availability,
        body_type: input.body_type,
        has_tarpaulin: input.has_tarpaulin,
        trailer_type: input.trailer_type,
        operating_areas: input.operating_areas,
        location: input.location,
        photos: input.photos,
        status: VehicleStatus::Available,
        is_approved: false,
        rejection_reason: None,
        rating: 0.0,
        rating_count: 0,
        created_at: now,
        updated_at: now,
    };

    let txn = state.store.write();
    state.store.insert_vehicle(&txn, vehicle.clone())?;
    drop(txn);

    info!(
        vehicle_id = %vehicle.id,
        owner_id = %caller.user_id,
        registration = %vehicle.registration_number,
        "vehicle registered"
    );
    Ok(vehicle)
}

pub fn list_own_vehicles(state: &AppState, caller: &Caller) -> Vec<Vehicle> {
    let mut vehicles = state.store.vehicles_owned_by(caller.user_id);
    vehicles.sort_by_key(|v| v.created_at);
    vehicles
}

pub fn review_vehicle(
    state: &AppState,
    caller: &Caller,
    vehicle_id: Uuid,
    approve: bool,
    reason: Option<String>,
) -> Result<Vehicle, AppError> {
    caller.require_admin()?;

    let txn = state.store.write();
    let now = state.now();
    let vehicle = state.store.update_vehicle(&txn, vehicle_id, |vehicle| {
        vehicle.is_approved = approve;
        vehicle.rejection_reason = if approve { None } else { reason };
        vehicle.updated_at = now;
    })?;
    drop(txn);

    info!(vehicle_id = %vehicle_id, approved = approve, "vehicle reviewed");
    Ok(vehicle)
}
