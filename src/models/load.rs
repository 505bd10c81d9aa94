use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::common::{Dimensions, Location, Photo};
use crate::models::vehicle::{TrailerType, VehicleType};

pub const MAX_MATERIALS: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Posted,
    Bidding,
    Assigned,
    #[serde(alias = "in_progress", alias = "in_transit")]
    Enroute,
    Delivered,
    Completed,
}

impl LoadStatus {
    /// A load still looking for a vehicle.
    pub fn is_open(self) -> bool {
        matches!(self, LoadStatus::Posted | LoadStatus::Bidding)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTerms {
    Advance,
    ToPay,
    Credit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRequirement {
    pub vehicle_type: VehicleType,
    /// Minimum body length in feet.
    pub size: u32,
    #[serde(default)]
    pub trailer_type: Option<TrailerType>,
}

impl VehicleRequirement {
    /// Trailer type the vehicle must match, if the load asks for one.
    pub fn required_trailer(&self) -> Option<TrailerType> {
        self.trailer_type.filter(|t| *t != TrailerType::None)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub name: String,
    pub dimensions: Dimensions,
    pub pack_type: String,
    pub count: u32,
    /// Weight of one unit in kg.
    pub unit_weight: f64,
    /// Weight of all units in kg.
    pub total_weight: f64,
    #[serde(default)]
    pub photos: Vec<Photo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Load {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub pickup: Location,
    pub drop: Location,
    pub vehicle_requirement: VehicleRequirement,
    pub materials: Vec<Material>,
    pub loading_date: DateTime<Utc>,
    pub loading_time: Option<String>,
    pub payment_terms: PaymentTerms,
    pub with_xbow_support: bool,
    pub commission_percent: f64,
    pub status: LoadStatus,
    pub assigned_vehicle_id: Option<Uuid>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Load {
    pub fn total_weight_kg(&self) -> f64 {
        self.materials.iter().map(|m| m.total_weight).sum()
    }

    pub fn total_weight_tons(&self) -> f64 {
        kg_to_tons(self.total_weight_kg())
    }

    pub fn commission_for(&self, agreed_price: f64) -> f64 {
        (agreed_price * self.commission_percent / 100.0).max(0.0)
    }
}

pub fn kg_to_tons(kg: f64) -> f64 {
    kg / 1000.0
}
