use actix_web::{
    HttpRequest, HttpResponse, get,
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    web::{self, Path},
};
use tracing::{Instrument, instrument};

use crate::{
    api::{
        middleware::trace_id_from_headers,
        rest::{
            CompareQuery, ComparisonResponse, DetectQuery, DetectResponse, DistrictElement, DistrictListQuery, DistrictListResponse, ExportQuery, FetchLogListResponse, FetchLogQuery, MonthlyRecordListResponse,
            MonthsQuery, SummaryQuery, SummaryResponse,
        },
        state::AppState,
    },
    model::{
        apperror::{ApplicationError, ErrorType},
        models::{CompareInputType, DetectInputType, DistrictListInputType, ExportInputType, FetchLogInputType, PaginationInput, SummaryInputType},
    },
};

/**
 * Endpoint to retrieve a page of districts.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "listDistricts", trace_id = get_trace_id(&http_request), result))]
#[get("/api/districts")]
pub async fn districts_list(http_request: HttpRequest, query: web::Query<DistrictListQuery>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let pagination_input = PaginationInput::from(&*query).validate()?;
    let filter = DistrictListInputType::new(query.into_inner().search).validate()?;
    let output = app_state.district_service.get_district_list(filter, pagination_input).instrument(span).await?;
    Ok(HttpResponse::Ok().json(DistrictListResponse::from(&*output)))
}

/**
 * Endpoint to find the district closest to a coordinate.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "detectDistrict", trace_id = get_trace_id(&http_request), result))]
#[get("/api/districts/detect")]
pub async fn districts_detect(http_request: HttpRequest, query: web::Query<DetectQuery>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let (Some(latitude), Some(longitude)) = (query.lat, query.lng) else {
        return Err(ApplicationError::new(ErrorType::Validation, "lat and lng are required".to_string()));
    };
    let input = DetectInputType { latitude, longitude }.validate()?;
    let output = app_state.district_service.detect_district(input).instrument(span).await?;
    Ok(HttpResponse::Ok().json(DetectResponse::from(output)))
}

/**
 * Endpoint to retrieve one district.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "getDistrict", trace_id = get_trace_id(&http_request), result))]
#[get("/api/districts/{districtId}")]
pub async fn district_get(path: Path<i64>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let district = app_state.district_service.get_district(path.into_inner()).instrument(span).await?;
    Ok(HttpResponse::Ok().json(DistrictElement::from(&district)))
}

/**
 * Endpoint to summarise the recent months of a district.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "districtSummary", trace_id = get_trace_id(&http_request), result))]
#[get("/api/districts/{districtId}/summary")]
pub async fn district_summary(path: Path<i64>, query: web::Query<SummaryQuery>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let input = SummaryInputType::new(query.year, query.months).validate()?;
    let output = app_state.district_service.get_summary(path.into_inner(), input).instrument(span).await?;
    Ok(HttpResponse::Ok().json(SummaryResponse::from(&*output)))
}

/**
 * Endpoint to page through the monthly records of a district.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "districtMonths", trace_id = get_trace_id(&http_request), result))]
#[get("/api/districts/{districtId}/months")]
pub async fn district_months(path: Path<i64>, query: web::Query<MonthsQuery>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let pagination_input = PaginationInput::from(&*query).validate()?;
    let output = app_state.district_service.get_record_list(path.into_inner(), pagination_input).instrument(span).await?;
    Ok(HttpResponse::Ok().json(MonthlyRecordListResponse::from(&*output)))
}

/**
 * Endpoint to download the monthly records of a district as csv or json.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "districtExport", trace_id = get_trace_id(&http_request), result))]
#[get("/api/districts/{districtId}/export")]
pub async fn district_export(path: Path<i64>, query: web::Query<ExportQuery>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let input = ExportInputType::parse(query.format.as_deref(), query.year)?;
    let export = app_state.district_service.export(path.into_inner(), input).instrument(span).await?;
    let disposition = ContentDisposition { disposition: DispositionType::Attachment, parameters: vec![DispositionParam::Filename(export.file_name)] };
    Ok(HttpResponse::Ok().content_type(export.content_type).insert_header(disposition).body(export.body))
}

/**
 * Endpoint to compare one metric across districts.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "compareDistricts", trace_id = get_trace_id(&http_request), result))]
#[get("/api/compare")]
pub async fn districts_compare(http_request: HttpRequest, query: web::Query<CompareQuery>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let input = CompareInputType::parse(query.district_ids.as_deref().unwrap_or_default(), query.metric.as_deref(), query.period.as_deref())?;
    let output = app_state.district_service.compare(input).instrument(span).await?;
    Ok(HttpResponse::Ok().json(ComparisonResponse::from(&*output)))
}

/**
 * Endpoint to list the most recent synchronisation runs.
 */
#[instrument(level = "info", skip(http_request, app_state), fields(service = "listFetchLogs", trace_id = get_trace_id(&http_request), result))]
#[get("/api/fetch-logs")]
pub async fn fetch_logs_list(http_request: HttpRequest, query: web::Query<FetchLogQuery>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let input = FetchLogInputType::new(query.limit).validate()?;
    let logs = app_state.district_service.get_fetch_logs(input.limit).instrument(span).await?;
    Ok(HttpResponse::Ok().json(FetchLogListResponse::from(logs)))
}

/**
 * Retrieves the trace ID from the HTTP request headers.
 * If the trace ID is not present, a new UUID is generated.
 */
pub fn get_trace_id(http_request: &HttpRequest) -> String {
    trace_id_from_headers(http_request.headers())
}

#[cfg(test)]
mod test {
    use actix_web::{App, http::StatusCode, test};
    use serde_json::Value;

    use super::*;
    use crate::api::configure;
    use crate::dao::test_support::{init_db, init_seeded_db};
    use crate::model::config::CacheConfig;
    use crate::service::districts::DistrictService;
    use sqlx::{Pool, Sqlite};
    use std::sync::Arc;

    fn state(pool: Pool<Sqlite>) -> web::Data<AppState> {
        web::Data::new(AppState::new(Arc::new(DistrictService::new(pool, &CacheConfig::default()))))
    }

    async fn get_json(pool: Pool<Sqlite>, uri: &str) -> (StatusCode, Value) {
        let app = test::init_service(App::new().app_data(state(pool)).configure(configure)).await;
        let response = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        let status = response.status();
        let body = test::read_body(response).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[actix_web::test]
    async fn test_districts_list_pages() {
        let pool = init_seeded_db().await;
        let app = test::init_service(App::new().app_data(state(pool)).configure(configure)).await;
        let mut names = Vec::new();
        let mut uri = "/api/districts?limit=4".to_string();
        loop {
            let response: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri(&uri).to_request()).await;
            assert_eq!(response["source"], "database");
            names.extend(response["districts"].as_array().unwrap().iter().map(|district| district["name"].as_str().unwrap().to_string()));
            match response["pagination"]["nextCursor"].as_i64() {
                Some(cursor) => uri = format!("/api/districts?limit=4&cursor={cursor}"),
                None => break,
            }
        }
        assert_eq!(names.len(), 10);
        assert_eq!(names[0], "Lucknow");
        assert_eq!(names[9], "Moradabad");
    }

    #[actix_web::test]
    async fn test_districts_list_search_and_fields() {
        let (status, body) = get_json(init_seeded_db().await, "/api/districts?search=VARAN").await;
        assert_eq!(status, StatusCode::OK);
        let districts = body["districts"].as_array().unwrap();
        assert_eq!(districts.len(), 1);
        assert_eq!(districts[0]["stateCode"], "09");
        assert_eq!(districts[0]["isoCode"], "IN-UP");
        assert_eq!(body["pagination"]["hasMore"], false);
    }

    #[actix_web::test]
    async fn test_districts_list_fallback_when_database_closed() {
        let pool = init_seeded_db().await;
        let data = state(pool.clone());
        pool.close().await;
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;
        let body: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/api/districts").to_request()).await;
        assert_eq!(body["source"], "fallback");
        assert_eq!(body["districts"].as_array().unwrap().len(), 10);
        assert!(body["districts"][0]["latitude"].is_f64());
    }

    #[actix_web::test]
    async fn test_invalid_limit_is_validation_error() {
        let (status, body) = get_json(init_db().await, "/api/districts?limit=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");
        let (status, body) = get_json(init_db().await, "/api/districts?limit=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 1002);
    }

    #[actix_web::test]
    async fn test_detect() {
        let (status, body) = get_json(init_seeded_db().await, "/api/districts/detect?lat=27.18&lng=78.01").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["district"]["name"], "Agra");
        assert!(body["distanceKm"].as_f64().unwrap() < 5.0);
        let (status, _) = get_json(init_seeded_db().await, "/api/districts/detect?lat=27.18").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = get_json(init_seeded_db().await, "/api/districts/detect?lat=NaN&lng=78.0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_district_get() {
        let (status, body) = get_json(init_seeded_db().await, "/api/districts/3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Varanasi");
        let (status, body) = get_json(init_seeded_db().await, "/api/districts/99").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
        let (status, _) = get_json(init_seeded_db().await, "/api/districts/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_summary() {
        let (status, body) = get_json(init_seeded_db().await, "/api/districts/1/summary?months=3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["monthCount"], 3);
        assert_eq!(body["lastPeriod"], "2024-12");
        assert_eq!(body["firstPeriod"], "2024-10");
        let (status, _) = get_json(init_seeded_db().await, "/api/districts/1/summary?months=61").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_months() {
        let (status, body) = get_json(init_seeded_db().await, "/api/districts/2/months?limit=2&cursor=202406").await;
        assert_eq!(status, StatusCode::OK);
        let records = body["records"].as_array().unwrap();
        assert_eq!(records[0]["period"], "2024-05");
        assert_eq!(records[1]["period"], "2024-04");
        assert_eq!(body["pagination"]["nextCursor"], 202_404);
    }

    #[actix_web::test]
    async fn test_compare() {
        let (status, body) = get_json(init_seeded_db().await, "/api/compare?district_ids=2,1,2&metric=avg_wage&period=6m").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metric"], "avg_wage");
        assert_eq!(body["aggregation"], "average");
        assert_eq!(body["period"], "6m");
        let districts = body["districts"].as_array().unwrap();
        assert_eq!(districts.len(), 2);
        assert_eq!(districts[0]["districtName"], "Kanpur Nagar");
        assert_eq!(districts[0]["series"].as_array().unwrap().len(), 6);
        let (status, _) = get_json(init_seeded_db().await, "/api/compare?metric=avg_wage").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = get_json(init_seeded_db().await, "/api/compare?district_ids=1&metric=height").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_export_csv() {
        let app = test::init_service(App::new().app_data(state(init_seeded_db().await)).configure(configure)).await;
        let response = test::call_service(&app, test::TestRequest::get().uri("/api/districts/1/export?format=csv&year=2024").to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("content-type").unwrap(), "text/csv; charset=utf-8");
        let disposition = response.headers().get("content-disposition").unwrap().to_str().unwrap().to_string();
        assert!(disposition.contains("mgnrega_lucknow_2024.csv"));
        let body = test::read_body(response).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(text.lines().count(), 13);
        assert!(text.starts_with("district_id,district_name"));
    }

    #[actix_web::test]
    async fn test_export_invalid_format() {
        let (status, body) = get_json(init_seeded_db().await, "/api/districts/1/export?format=xml").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");
    }

    #[actix_web::test]
    async fn test_fetch_logs() {
        let (status, body) = get_json(init_seeded_db().await, "/api/fetch-logs").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["fetchLogs"].as_array().unwrap().is_empty());
        let (status, body) = get_json(init_seeded_db().await, "/api/fetch-logs?limit=500").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");
        let (status, _) = get_json(init_seeded_db().await, "/api/fetch-logs?limit=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
