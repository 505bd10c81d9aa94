//! Best-effort room fan-out of marketplace events. Nothing is replayed.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use prometheus::IntCounterVec;
use serde::{Serialize, Serializer};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    Bidding(Uuid),
    User(Uuid),
    Load(Uuid),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Bidding(id) => write!(f, "bidding-{id}"),
            Room::User(id) => write!(f, "user-{id}"),
            Room::Load(id) => write!(f, "load-{id}"),
        }
    }
}

impl FromStr for Room {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (kind, id) = raw
            .split_once('-')
            .ok_or_else(|| format!("invalid room id: {raw}"))?;
        let id = Uuid::parse_str(id).map_err(|err| format!("invalid room id {raw}: {err}"))?;

        match kind {
            "bidding" => Ok(Room::Bidding(id)),
            "user" => Ok(Room::User(id)),
            "load" => Ok(Room::Load(id)),
            other => Err(format!("unknown room kind: {other}")),
        }
    }
}

impl Serialize for Room {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    NewBid,
    BidUpdated,
    BidAccepted,
    BiddingClosed,
    TransportRequest,
    JourneyStarted,
    AssignmentStatus,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::NewBid => "new-bid",
            EventKind::BidUpdated => "bid-updated",
            EventKind::BidAccepted => "bid-accepted",
            EventKind::BiddingClosed => "bidding-closed",
            EventKind::TransportRequest => "transport-request",
            EventKind::JourneyStarted => "journey-started",
            EventKind::AssignmentStatus => "assignment-status",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomEvent {
    pub room: Room,
    pub event: EventKind,
    pub data: serde_json::Value,
    pub at: DateTime<Utc>,
}

pub struct Notifier {
    tx: broadcast::Sender<RoomEvent>,
    published: IntCounterVec,
    clock: Arc<dyn Clock>,
}

impl Notifier {
    pub fn new(buffer_size: usize, published: IntCounterVec, clock: Arc<dyn Clock>) -> Self {
        let (tx, _unused_rx) = broadcast::channel(buffer_size.max(1));
        Self {
            tx,
            published,
            clock,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.tx.subscribe()
    }

    /// Fire-and-forget. Failures are logged and never reach the caller.
    pub fn publish<T: Serialize>(&self, room: Room, event: EventKind, payload: &T) {
        let data = match serde_json::to_value(payload) {
            Ok(data) => data,
            Err(err) => {
                warn!(%room, event = event.as_str(), error = %err, "failed to serialize event payload");
                return;
            }
        };

        self.published.with_label_values(&[event.as_str()]).inc();

        let message = RoomEvent {
            room,
            event,
            data,
            at: self.clock.now(),
        };

        if self.tx.send(message).is_err() {
            debug!(%room, event = event.as_str(), "no subscribers; event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use prometheus::{IntCounterVec, Opts};
    use serde_json::json;
    use uuid::Uuid;

    use super::{EventKind, Notifier, Room};
    use crate::clock::ManualClock;

    fn counter() -> IntCounterVec {
        IntCounterVec::new(Opts::new("test_notifications", "test"), &["event"]).unwrap()
    }

    fn notifier() -> Notifier {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        Notifier::new(8, counter(), Arc::new(clock))
    }

    #[test]
    fn room_ids_round_trip_through_strings() {
        let id = Uuid::new_v4();
        for room in [Room::Bidding(id), Room::User(id), Room::Load(id)] {
            assert_eq!(room.to_string().parse::<Room>().unwrap(), room);
        }
        assert_eq!(Room::Bidding(id).to_string(), format!("bidding-{id}"));
        assert!("auction-1".parse::<Room>().is_err());
        assert!("bidding-not-a-uuid".parse::<Room>().is_err());
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let notifier = notifier();
        notifier.publish(Room::User(Uuid::new_v4()), EventKind::NewBid, &json!({"a": 1}));
    }

    #[tokio::test]
    async fn subscribers_receive_room_tagged_events() {
        let notifier = notifier();
        let mut rx = notifier.subscribe();
        let room = Room::Bidding(Uuid::new_v4());

        notifier.publish(room, EventKind::BiddingClosed, &json!({"status": "closed"}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.room, room);
        assert_eq!(event.event, EventKind::BiddingClosed);
        assert_eq!(event.data["status"], "closed");

        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["event"], "bidding-closed");
        assert_eq!(wire["room"], room.to_string());
    }

    #[tokio::test]
    async fn events_are_stamped_by_the_injected_clock() {
        let start = Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let notifier = Notifier::new(8, counter(), clock.clone());
        let mut rx = notifier.subscribe();
        let room = Room::Load(Uuid::new_v4());

        notifier.publish(room, EventKind::AssignmentStatus, &json!({"status": "assigned"}));
        clock.advance(Duration::minutes(10));
        notifier.publish(room, EventKind::AssignmentStatus, &json!({"status": "enroute"}));

        assert_eq!(rx.recv().await.unwrap().at, start);
        assert_eq!(rx.recv().await.unwrap().at, start + Duration::minutes(10));
    }
}
