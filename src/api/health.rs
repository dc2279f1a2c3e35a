use actix_web::{HttpRequest, HttpResponse, get, web};
use tracing::{Instrument, instrument, warn};

use crate::api::{
    endpoints::get_trace_id,
    rest::{HealthResponse, ProbeResponse},
    state::AppState,
};

/**
 * Endpoint reporting version, uptime and database state. Answers 200 also while degraded.
 */
#[instrument(level = "debug", skip(http_request, app_state), fields(service = "health", trace_id = get_trace_id(&http_request)))]
#[get("/api/health")]
pub async fn health(http_request: HttpRequest, app_state: web::Data<AppState>) -> HttpResponse {
    let span = tracing::Span::current();
    let database_up = app_state.district_service.ping().instrument(span).await.is_ok();
    HttpResponse::Ok().json(HealthResponse {
        status: if database_up { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: app_state.started_at.elapsed().as_secs(),
        database: if database_up { "up" } else { "down" },
    })
}

/**
 * Readiness probe, 503 while the database does not answer.
 */
#[get("/api/health/ready")]
pub async fn health_ready(app_state: web::Data<AppState>) -> HttpResponse {
    match app_state.district_service.ping().await {
        Ok(()) => HttpResponse::Ok().json(ProbeResponse { status: "ready" }),
        Err(err) => {
            warn!("Readiness check failed: {}", err);
            HttpResponse::ServiceUnavailable().json(ProbeResponse { status: "unavailable" })
        }
    }
}

/**
 * Liveness probe.
 */
#[get("/api/health/live")]
pub async fn health_live() -> HttpResponse {
    HttpResponse::Ok().json(ProbeResponse { status: "alive" })
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use actix_web::{App, http::StatusCode, test};
    use serde_json::Value;

    use super::*;
    use crate::api::configure;
    use crate::dao::test_support::init_db;
    use crate::model::config::CacheConfig;
    use crate::service::districts::DistrictService;

    #[actix_web::test]
    async fn test_health_with_database() {
        let state = web::Data::new(AppState::new(Arc::new(DistrictService::new(init_db().await, &CacheConfig::default()))));
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;
        let body: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/api/health").to_request()).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "up");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["uptimeSecs"].is_u64());
        let response = test::call_service(&app, test::TestRequest::get().uri("/api/health/ready").to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_health_without_database() {
        let pool = init_db().await;
        let state = web::Data::new(AppState::new(Arc::new(DistrictService::new(pool.clone(), &CacheConfig::default()))));
        pool.close().await;
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;
        let body: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/api/health").to_request()).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["database"], "down");
        let response = test::call_service(&app, test::TestRequest::get().uri("/api/health/ready").to_request()).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let response = test::call_service(&app, test::TestRequest::get().uri("/api/health/live").to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
