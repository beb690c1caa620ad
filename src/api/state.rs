use std::sync::Arc;

use crate::observability::Metrics;
use crate::queue::AdmissionQueue;
use crate::resolver::Resolver;
use crate::settings::SettingsStore;
use crate::shutdown::ShutdownCoordinator;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<SettingsStore>,
    pub queue: AdmissionQueue,
    pub resolver: Arc<dyn Resolver>,
    pub coordinator: Arc<ShutdownCoordinator>,
    pub metrics: Arc<Metrics>,
    pub media_url_template: Arc<str>,
    pub max_payload_bytes: usize,
}
