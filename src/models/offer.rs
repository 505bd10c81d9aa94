use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    AdminReview,
    AdminApproved,
    AdminRejected,
    Pending,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    /// The provider may accept or reject the application in this state.
    pub fn awaits_provider(self) -> bool {
        matches!(self, ApplicationStatus::Pending | ApplicationStatus::AdminApproved)
    }

    /// Not yet decided by anyone; loses when another offer wins the load.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Pending
                | ApplicationStatus::AdminReview
                | ApplicationStatus::AdminApproved
        )
    }
}

/// Status shared by provider-initiated requests and transport requests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A counterparty's answer to an offer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accepted,
    Rejected,
}

/// A vehicle owner applying to carry a load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleApplication {
    pub id: Uuid,
    pub load_id: Uuid,
    pub vehicle_id: Uuid,
    pub vehicle_owner_id: Uuid,
    pub load_provider_id: Uuid,
    pub bid_price: f64,
    pub message: Option<String>,
    pub agreed_price: Option<f64>,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A load provider inviting a specific vehicle to carry a load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRequest {
    pub id: Uuid,
    pub load_id: Uuid,
    pub vehicle_id: Uuid,
    pub load_provider_id: Uuid,
    pub vehicle_owner_id: Uuid,
    pub proposed_price: f64,
    pub message: Option<String>,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
