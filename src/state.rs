use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::auth::{seed_admin, IdentityService};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::notify::Notifier;
use crate::observability::metrics::Metrics;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct MarketSettings {
    pub xbow_commission_percent: f64,
    pub session_start_grace: Duration,
}

pub struct AppState {
    pub store: Store,
    pub identity: IdentityService,
    pub notifier: Notifier,
    pub metrics: Metrics,
    pub clock: Arc<dyn Clock>,
    pub settings: MarketSettings,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Self {
        let metrics = Metrics::new();
        let notifier = Notifier::new(
            config.event_buffer_size,
            metrics.notifications_total.clone(),
            clock.clone(),
        );

        let state = Self {
            store: Store::new(),
            identity: IdentityService::new(),
            notifier,
            metrics,
            clock,
            settings: MarketSettings {
                xbow_commission_percent: config.xbow_commission_percent,
                session_start_grace: Duration::seconds(config.session_start_grace_secs.max(0)),
            },
        };

        if let Some(token) = &config.admin_token {
            seed_admin(&state, "admin", token);
        }

        state
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
