use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::common::{Dimensions, GeoPoint, OperatingArea, Photo};

/// Body lengths, in feet, that vehicles are registered with.
pub const VEHICLE_SIZES_FT: [u32; 7] = [14, 17, 19, 20, 22, 24, 32];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VehicleType {
    #[serde(rename = "4-wheel")]
    FourWheel,
    #[serde(rename = "6-wheel")]
    SixWheel,
    #[serde(rename = "10-wheel")]
    TenWheel,
    #[serde(rename = "12-wheel")]
    TwelveWheel,
    #[serde(rename = "14-wheel")]
    FourteenWheel,
    #[serde(rename = "16-wheel")]
    SixteenWheel,
    #[serde(rename = "18-wheel")]
    EighteenWheel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrailerType {
    #[default]
    None,
    Flatbed,
    LowBed,
    SemiLowBed,
    HighBed,
    Container,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BodyType {
    #[default]
    Open,
    Closed,
    Container,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Available,
    Assigned,
    InTransit,
    Delivered,
    Maintenance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub vehicle_type: VehicleType,
    /// Body length in feet.
    pub vehicle_size: u32,
    /// Kerb weight in tons.
    pub vehicle_weight: f64,
    /// Certified maximum payload in tons.
    pub passing_limit: f64,
    pub dimensions: Dimensions,
    pub registration_number: String,
    pub availability: DateTime<Utc>,
    pub body_type: BodyType,
    pub has_tarpaulin: bool,
    pub trailer_type: TrailerType,
    pub operating_areas: Vec<OperatingArea>,
    pub location: Option<GeoPoint>,
    pub photos: Vec<Photo>,
    pub status: VehicleStatus,
    pub is_approved: bool,
    pub rejection_reason: Option<String>,
    pub rating: f64,
    pub rating_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn is_assignable(&self) -> bool {
        self.is_approved && self.status == VehicleStatus::Available
    }

    /// Folds one more rating into the running average.
    pub fn record_rating(&mut self, score: u8) {
        let total = self.rating * f64::from(self.rating_count) + f64::from(score);
        self.rating_count += 1;
        self.rating = total / f64::from(self.rating_count);
    }
}

/// Canonical form used by the registration-number unique index.
pub fn normalize_registration(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::normalize_registration;

    #[test]
    fn registration_numbers_normalize_spacing_and_case() {
        assert_eq!(normalize_registration("ka 01-ab 1234"), "KA01AB1234");
        assert_eq!(
            normalize_registration("KA01AB1234"),
            normalize_registration(" ka01ab1234 ")
        );
    }
}
