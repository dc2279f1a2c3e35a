pub mod endpoints;
pub mod health;
pub mod middleware;
pub mod rest;
pub mod state;

use actix_web::web;

use crate::api::{
    endpoints::{district_export, district_get, district_months, district_summary, districts_compare, districts_detect, districts_list, fetch_logs_list},
    health::{health_live, health_ready},
    rest::{path_config, query_config},
};

/**
 * Registers all api routes. `/api/districts/detect` is registered before `/api/districts/{districtId}` so that
 * it is not taken for a district id.
 */
pub fn configure(config: &mut web::ServiceConfig) {
    config
        .app_data(query_config())
        .app_data(path_config())
        .service(districts_list)
        .service(districts_detect)
        .service(district_get)
        .service(district_summary)
        .service(district_months)
        .service(district_export)
        .service(districts_compare)
        .service(fetch_logs_list)
        .service(health::health)
        .service(health_ready)
        .service(health_live);
}
