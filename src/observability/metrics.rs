use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub bids_total: IntCounterVec,
    pub assignments_total: IntCounterVec,
    pub status_transitions_total: IntCounterVec,
    pub notifications_total: IntCounterVec,
    pub active_bidding_sessions: IntGauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let bids_total = IntCounterVec::new(
            Opts::new("bids_total", "Bids placed, by whether they created or updated a bid"),
            &["kind"],
        )
        .expect("valid bids_total metric");

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Load assignments created, by resolution path"),
            &["source"],
        )
        .expect("valid assignments_total metric");

        let status_transitions_total = IntCounterVec::new(
            Opts::new(
                "status_transitions_total",
                "Assignment status transitions, by target status",
            ),
            &["status"],
        )
        .expect("valid status_transitions_total metric");

        let notifications_total = IntCounterVec::new(
            Opts::new("notifications_total", "Real-time events published, by event"),
            &["event"],
        )
        .expect("valid notifications_total metric");

        let active_bidding_sessions = IntGauge::new(
            "active_bidding_sessions",
            "Bidding sessions currently accepting bids",
        )
        .expect("valid active_bidding_sessions metric");

        registry
            .register(Box::new(bids_total.clone()))
            .expect("register bids_total");
        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");
        registry
            .register(Box::new(active_bidding_sessions.clone()))
            .expect("register active_bidding_sessions");

        Self {
            registry,
            bids_total,
            assignments_total,
            status_transitions_total,
            notifications_total,
            active_bidding_sessions,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
