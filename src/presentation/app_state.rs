// Application state for HTTP handlers
use crate::application::dashboard_service::NitrateDashboardService;
use crate::domain::measure_map::MeasureMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service: NitrateDashboardService,
    pub measures: Arc<MeasureMap>,
}
