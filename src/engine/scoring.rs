//! Ranking only; never decides candidacy.

use serde::Serialize;

use crate::geo::distance_to;
use crate::models::assignment::ScoreBreakdown;
use crate::models::load::Load;
use crate::models::vehicle::Vehicle;

const TYPE_WEIGHT: f64 = 0.25;
const SIZE_WEIGHT: f64 = 0.15;
const CAPACITY_WEIGHT: f64 = 0.20;
const TRAILER_WEIGHT: f64 = 0.10;
const RATING_WEIGHT: f64 = 0.15;
const PROXIMITY_WEIGHT: f64 = 0.15;

// Distance at which the proximity score halves.
const PROXIMITY_HALF_KM: f64 = 50.0;
// Rating score for vehicles nobody has rated yet.
const UNRATED_SCORE: f64 = 0.6;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedVehicle {
    pub vehicle: Vehicle,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Returns a score in `0.0..=100.0` with its per-factor breakdown.
pub fn compute_score(vehicle: &Vehicle, load: &Load) -> (f64, ScoreBreakdown) {
    let breakdown = ScoreBreakdown {
        type_score: type_score(vehicle, load),
        size_score: size_score(vehicle.vehicle_size, load.vehicle_requirement.size),
        capacity_score: capacity_score(vehicle.passing_limit, load.total_weight_tons()),
        trailer_score: trailer_score(vehicle, load),
        rating_score: rating_score(vehicle),
        proximity_score: proximity_score(vehicle, load),
    };

    (weighted_score(&breakdown) * 100.0, breakdown)
}

pub fn weighted_score(breakdown: &ScoreBreakdown) -> f64 {
    (breakdown.type_score * TYPE_WEIGHT)
        + (breakdown.size_score * SIZE_WEIGHT)
        + (breakdown.capacity_score * CAPACITY_WEIGHT)
        + (breakdown.trailer_score * TRAILER_WEIGHT)
        + (breakdown.rating_score * RATING_WEIGHT)
        + (breakdown.proximity_score * PROXIMITY_WEIGHT)
}

/// Scores every vehicle and sorts best first.
pub fn rank(load: &Load, vehicles: Vec<Vehicle>) -> Vec<RankedVehicle> {
    let mut ranked: Vec<RankedVehicle> = vehicles
        .into_iter()
        .map(|vehicle| {
            let (score, breakdown) = compute_score(&vehicle, load);
            RankedVehicle {
                vehicle,
                score,
                breakdown,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

fn type_score(vehicle: &Vehicle, load: &Load) -> f64 {
    if vehicle.vehicle_type == load.vehicle_requirement.vehicle_type {
        1.0
    } else {
        0.0
    }
}

// Tightest fit wins: a 20 ft truck for a 20 ft requirement beats a 32 ft one.
fn size_score(vehicle_size: u32, required: u32) -> f64 {
    if vehicle_size < required {
        return 0.0;
    }
    if required == 0 {
        return 1.0;
    }

    let headroom = f64::from(vehicle_size - required) / f64::from(required);
    1.0 / (1.0 + headroom)
}

fn capacity_score(passing_limit_tons: f64, load_tons: f64) -> f64 {
    if passing_limit_tons <= 0.0 || load_tons > passing_limit_tons {
        return 0.0;
    }

    let utilization = load_tons / passing_limit_tons;
    (0.5 + 0.5 * utilization).clamp(0.0, 1.0)
}

fn trailer_score(vehicle: &Vehicle, load: &Load) -> f64 {
    match load.vehicle_requirement.required_trailer() {
        None => 1.0,
        Some(trailer) if trailer == vehicle.trailer_type => 1.0,
        Some(_) => 0.0,
    }
}

fn rating_score(vehicle: &Vehicle) -> f64 {
    if vehicle.rating_count == 0 {
        return UNRATED_SCORE;
    }
    (vehicle.rating / 5.0).clamp(0.0, 1.0)
}

fn proximity_score(vehicle: &Vehicle, load: &Load) -> f64 {
    if let Some(km) = vehicle
        .location
        .as_ref()
        .and_then(|point| distance_to(point, &load.pickup))
    {
        return PROXIMITY_HALF_KM / (PROXIMITY_HALF_KM + km.max(0.0));
    }

    let areas = &vehicle.operating_areas;
    if areas.iter().any(|area| area.covers_district(&load.pickup)) {
        1.0
    } else if areas.iter().any(|area| area.covers_state(&load.pickup)) {
        0.5
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::{compute_score, rank};
    use crate::engine::fixtures::{load, vehicle};
    use crate::models::common::GeoPoint;
    use crate::models::vehicle::VehicleType;

    #[test]
    fn score_is_within_zero_and_hundred() {
        let cargo = load(VehicleType::FourWheel, 20, 2_000.0);
        let truck = vehicle(VehicleType::FourWheel, 20, 3.0);
        let (score, _) = compute_score(&truck, &cargo);
        assert!(score > 0.0 && score <= 100.0);
    }

    #[test]
    fn closer_vehicle_scores_higher_when_other_factors_match() {
        let cargo = load(VehicleType::FourWheel, 20, 2_000.0);
        let near = vehicle(VehicleType::FourWheel, 20, 3.0);
        let mut far = vehicle(VehicleType::FourWheel, 20, 3.0);
        far.location = Some(GeoPoint {
            lat: 19.07,
            lng: 72.87,
        });

        let (near_score, _) = compute_score(&near, &cargo);
        let (far_score, _) = compute_score(&far, &cargo);
        assert!(near_score > far_score);
    }

    #[test]
    fn operating_area_stands_in_for_missing_coordinates() {
        let cargo = load(VehicleType::FourWheel, 20, 2_000.0);
        let mut local = vehicle(VehicleType::FourWheel, 20, 3.0);
        local.location = None;
        let mut elsewhere = local.clone();
        elsewhere.operating_areas[0].state = "Kerala".to_string();

        let (_, local_breakdown) = compute_score(&local, &cargo);
        let (_, elsewhere_breakdown) = compute_score(&elsewhere, &cargo);
        assert_eq!(local_breakdown.proximity_score, 1.0);
        assert_eq!(elsewhere_breakdown.proximity_score, 0.0);
    }

    #[test]
    fn tighter_size_fit_ranks_first() {
        let cargo = load(VehicleType::FourWheel, 20, 2_000.0);
        let snug = vehicle(VehicleType::FourWheel, 20, 3.0);
        let roomy = vehicle(VehicleType::FourWheel, 32, 3.0);

        let ranked = rank(&cargo, vec![roomy.clone(), snug.clone()]);
        assert_eq!(ranked[0].vehicle.id, snug.id);
        assert_eq!(ranked[1].vehicle.id, roomy.id);
        assert!(ranked[0].breakdown.size_score > ranked[1].breakdown.size_score);
    }

    #[test]
    fn well_rated_vehicle_beats_unrated_one() {
        let cargo = load(VehicleType::FourWheel, 20, 2_000.0);
        let unrated = vehicle(VehicleType::FourWheel, 20, 3.0);
        let mut rated = unrated.clone();
        rated.record_rating(5);

        let (unrated_score, _) = compute_score(&unrated, &cargo);
        let (rated_score, _) = compute_score(&rated, &cargo);
        assert!(rated_score > unrated_score);
    }
}
