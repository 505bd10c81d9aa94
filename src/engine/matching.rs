//! Load weights are in kg, passing limits in tons.

use crate::error::AppError;
use crate::models::load::Load;
use crate::models::vehicle::{Vehicle, VehicleStatus};

/// First rule a vehicle fails for a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    NotApproved,
    NotAvailable,
    VehicleType,
    Size,
    Capacity,
    Trailer,
    AvailableTooLate,
}

impl Mismatch {
    pub fn reason(self) -> &'static str {
        match self {
            Mismatch::NotApproved => "Vehicle is not approved",
            Mismatch::NotAvailable => "Vehicle is not available",
            Mismatch::VehicleType => "Vehicle type does not match the load requirement",
            Mismatch::Size => "Vehicle is smaller than the required size",
            Mismatch::Capacity => "Load weight exceeds the vehicle's passing limit",
            Mismatch::Trailer => "Trailer type does not match the load requirement",
            Mismatch::AvailableTooLate => "Vehicle is not available by the loading date",
        }
    }
}

pub fn check_compatibility(vehicle: &Vehicle, load: &Load) -> Result<(), Mismatch> {
    let requirement = &load.vehicle_requirement;

    if !vehicle.is_approved {
        return Err(Mismatch::NotApproved);
    }
    if vehicle.status != VehicleStatus::Available {
        return Err(Mismatch::NotAvailable);
    }
    if vehicle.vehicle_type != requirement.vehicle_type {
        return Err(Mismatch::VehicleType);
    }
    if vehicle.vehicle_size < requirement.size {
        return Err(Mismatch::Size);
    }
    if vehicle.passing_limit < load.total_weight_tons() {
        return Err(Mismatch::Capacity);
    }
    if let Some(trailer) = requirement.required_trailer() {
        if vehicle.trailer_type != trailer {
            return Err(Mismatch::Trailer);
        }
    }
    if vehicle.availability > load.loading_date {
        return Err(Mismatch::AvailableTooLate);
    }

    Ok(())
}

/// [`check_compatibility`] as a client error carrying the failed rule.
pub fn require_compatible(vehicle: &Vehicle, load: &Load) -> Result<(), AppError> {
    check_compatibility(vehicle, load)
        .map_err(|mismatch| AppError::InvalidInput(mismatch.reason().to_string()))
}

pub fn is_candidate(vehicle: &Vehicle, load: &Load) -> bool {
    check_compatibility(vehicle, load).is_ok()
}

/// Every vehicle that can carry `load`, in no particular order.
pub fn find_candidates<I>(load: &Load, vehicles: I) -> Vec<Vehicle>
where
    I: IntoIterator<Item = Vehicle>,
{
    vehicles
        .into_iter()
        .filter(|vehicle| is_candidate(vehicle, load))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::{check_compatibility, find_candidates, Mismatch};
    use crate::engine::fixtures::{load, vehicle};
    use crate::models::vehicle::{TrailerType, VehicleStatus, VehicleType};

    #[test]
    fn passing_limit_is_compared_in_tons() {
        let truck = vehicle(VehicleType::FourWheel, 20, 10.0);

        let exact = load(VehicleType::FourWheel, 20, 10_000.0);
        assert_eq!(check_compatibility(&truck, &exact), Ok(()));

        let over = load(VehicleType::FourWheel, 20, 10_001.0);
        assert_eq!(check_compatibility(&truck, &over), Err(Mismatch::Capacity));
    }

    #[test]
    fn total_weight_sums_all_materials() {
        let truck = vehicle(VehicleType::FourWheel, 20, 3.0);
        let mut cargo = load(VehicleType::FourWheel, 20, 2_000.0);
        assert!(check_compatibility(&truck, &cargo).is_ok());

        cargo.materials.push(crate::engine::fixtures::material(1_500.0));
        assert_eq!(check_compatibility(&truck, &cargo), Err(Mismatch::Capacity));
    }

    #[test]
    fn vehicle_must_be_at_least_the_required_size() {
        let cargo = load(VehicleType::SixWheel, 20, 1_000.0);
        let small = vehicle(VehicleType::SixWheel, 19, 5.0);
        let big = vehicle(VehicleType::SixWheel, 24, 5.0);

        assert_eq!(check_compatibility(&small, &cargo), Err(Mismatch::Size));
        assert!(check_compatibility(&big, &cargo).is_ok());
    }

    #[test]
    fn trailer_only_checked_when_required() {
        let mut cargo = load(VehicleType::TenWheel, 20, 1_000.0);
        let mut truck = vehicle(VehicleType::TenWheel, 20, 5.0);
        truck.trailer_type = TrailerType::Flatbed;
        assert!(check_compatibility(&truck, &cargo).is_ok());

        cargo.vehicle_requirement.trailer_type = Some(TrailerType::None);
        assert!(check_compatibility(&truck, &cargo).is_ok());

        cargo.vehicle_requirement.trailer_type = Some(TrailerType::LowBed);
        assert_eq!(check_compatibility(&truck, &cargo), Err(Mismatch::Trailer));

        truck.trailer_type = TrailerType::LowBed;
        assert!(check_compatibility(&truck, &cargo).is_ok());
    }

    #[test]
    fn vehicle_must_be_free_by_loading_date() {
        let cargo = load(VehicleType::FourWheel, 20, 1_000.0);
        let mut truck = vehicle(VehicleType::FourWheel, 20, 5.0);

        truck.availability = cargo.loading_date;
        assert!(check_compatibility(&truck, &cargo).is_ok());

        truck.availability = cargo.loading_date + Duration::days(1);
        assert_eq!(
            check_compatibility(&truck, &cargo),
            Err(Mismatch::AvailableTooLate)
        );
    }

    #[test]
    fn find_candidates_filters_unapproved_busy_and_wrong_type() {
        let cargo = load(VehicleType::FourWheel, 20, 2_000.0);

        let good = vehicle(VehicleType::FourWheel, 20, 3.0);
        let mut unapproved = vehicle(VehicleType::FourWheel, 20, 3.0);
        unapproved.is_approved = false;
        let mut busy = vehicle(VehicleType::FourWheel, 20, 3.0);
        busy.status = VehicleStatus::InTransit;
        let wrong_type = vehicle(VehicleType::TwelveWheel, 20, 30.0);

        let found = find_candidates(&cargo, vec![good.clone(), unapproved, busy, wrong_type]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, good.id);
    }

    #[test]
    fn empty_pool_is_not_an_error() {
        let cargo = load(VehicleType::FourWheel, 20, 2_000.0);
        assert!(find_candidates(&cargo, Vec::new()).is_empty());
    }
}
