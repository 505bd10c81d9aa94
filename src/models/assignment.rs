use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-factor compatibility of a vehicle for a load, each in `0.0..=1.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub type_score: f64,
    pub size_score: f64,
    pub capacity_score: f64,
    pub trailer_score: f64,
    pub rating_score: f64,
    pub proximity_score: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    #[serde(alias = "in_progress", alias = "in_transit")]
    Enroute,
    Delivered,
    Completed,
}

/// Which resolution path produced an assignment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentSource {
    Admin,
    Application,
    VehicleRequest,
    Bidding,
}

impl AssignmentSource {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentSource::Admin => "admin",
            AssignmentSource::Application => "application",
            AssignmentSource::VehicleRequest => "vehicle_request",
            AssignmentSource::Bidding => "bidding",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentNote {
    pub author_id: Uuid,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadAssignment {
    pub id: Uuid,
    pub load_id: Uuid,
    pub vehicle_id: Uuid,
    pub load_provider_id: Uuid,
    pub vehicle_owner_id: Uuid,
    pub application_id: Option<Uuid>,
    pub source: AssignmentSource,
    pub agreed_price: f64,
    pub commission_amount: f64,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Vec<AssignmentNote>,
    pub updated_at: DateTime<Utc>,
}

impl LoadAssignment {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.load_provider_id == user_id || self.vehicle_owner_id == user_id
    }
}
