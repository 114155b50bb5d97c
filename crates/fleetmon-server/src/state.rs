use chrono::{DateTime, Utc};
use fleetmon_storage::MetricStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MetricStore>,
    pub start_time: DateTime<Utc>,
}
