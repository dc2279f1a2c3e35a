use std::sync::Arc;
use std::time::Instant;

use crate::service::districts::DistrictService;

/**
* Represents the application state shared across the Actix web application.
*/
pub struct AppState {
    /**
     * The district service answering all read endpoints.
     */
    pub district_service: Arc<DistrictService>,
    /**
     * When the application started, for the uptime in the health response.
     */
    pub started_at: Instant,
}

impl AppState {
    /**
     * Creates a new instance of `AppState`.
     *
     * # Arguments
     * `district_service`: The district service answering all read endpoints.
     */
    pub fn new(district_service: Arc<DistrictService>) -> Self {
        AppState { district_service, started_at: Instant::now() }
    }
}
