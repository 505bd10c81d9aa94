use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::offer::OfferStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Closed,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Active,
    Withdrawn,
    Selected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiddingSession {
    pub id: Uuid,
    pub load_id: Uuid,
    pub load_provider_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SessionStatus,
    pub min_bid_amount: Option<f64>,
    pub max_bid_amount: Option<f64>,
    pub winning_bid_id: Option<Uuid>,
    pub total_bids: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BiddingSession {
    /// Active on paper but past its end time; the next reader closes it.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Active && now > self.end_time
    }

    pub fn accepts_amount(&self, amount: f64) -> bool {
        self.min_bid_amount.is_none_or(|min| amount >= min)
            && self.max_bid_amount.is_none_or(|max| amount <= max)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub id: Uuid,
    pub bidding_session_id: Uuid,
    pub load_id: Uuid,
    pub vehicle_id: Uuid,
    pub vehicle_owner_id: Uuid,
    pub bid_amount: f64,
    pub message: Option<String>,
    pub status: BidStatus,
    pub is_winning: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Confirmation offer sent by the provider to the owner of the winning bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportRequest {
    pub id: Uuid,
    pub load_id: Uuid,
    pub vehicle_id: Uuid,
    pub load_provider_id: Uuid,
    pub vehicle_owner_id: Uuid,
    pub bid_id: Uuid,
    pub bidding_session_id: Uuid,
    pub agreed_price: f64,
    pub message: Option<String>,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::{BiddingSession, SessionStatus};

    fn session(min: Option<f64>, max: Option<f64>) -> BiddingSession {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        BiddingSession {
            id: Uuid::new_v4(),
            load_id: Uuid::new_v4(),
            load_provider_id: Uuid::new_v4(),
            start_time: start,
            end_time: start + Duration::days(1),
            status: SessionStatus::Active,
            min_bid_amount: min,
            max_bid_amount: max,
            winning_bid_id: None,
            total_bids: 0,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn bounds_are_inclusive() {
        let s = session(Some(1000.0), Some(5000.0));
        assert!(!s.accepts_amount(999.0));
        assert!(s.accepts_amount(1000.0));
        assert!(s.accepts_amount(5000.0));
        assert!(!s.accepts_amount(5001.0));
    }

    #[test]
    fn missing_bounds_accept_anything() {
        let s = session(None, Some(10.0));
        assert!(s.accepts_amount(0.5));
        assert!(!s.accepts_amount(10.5));
    }

    #[test]
    fn expiry_only_applies_to_active_sessions() {
        let mut s = session(None, None);
        let after = s.end_time + Duration::seconds(1);
        assert!(!s.is_expired(s.end_time));
        assert!(s.is_expired(after));

        s.status = SessionStatus::Closed;
        assert!(!s.is_expired(after));
    }
}
