use actix_web::{HttpResponse, ResponseError, http::StatusCode, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    models::{
        Aggregation, ComparisonOutputType, DataSource, DetectOutputType, DistrictComparisonType, DistrictDetailType, DistrictListOutputType, FetchLogType, MetricPointType, MonthlyRecordListOutputType, MonthlyRecordType,
        PaginationInput, PaginationOutput, SummaryOutputType, format_period,
    },
};

/***************** Districts models *********************/

/**
 * Query parameters of the district list.
 */
#[derive(Debug, Deserialize)]
pub struct DistrictListQuery {
    /**
     * Case insensitive substring of district or state name.
     */
    pub search: Option<String>,
    pub cursor: Option<i64>,
    pub limit: Option<i64>,
}

/**
 * Query parameters of district detection.
 */
#[derive(Debug, Deserialize)]
pub struct DetectQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/**
 * Represents a district in API responses.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictElement {
    id: i64,
    name: String,
    state_code: String,
    state_name: String,
    /**
     * Latitude of the district centroid.
     */
    latitude: f64,
    /**
     * Longitude of the district centroid.
     */
    longitude: f64,
    iso_code: String,
}

impl From<&DistrictDetailType> for DistrictElement {
    fn from(district: &DistrictDetailType) -> Self {
        DistrictElement {
            id: district.id,
            name: district.name.clone(),
            state_code: district.state_code.clone(),
            state_name: district.state_name.clone(),
            latitude: district.latitude,
            longitude: district.longitude,
            iso_code: district.iso_code.clone(),
        }
    }
}

/**
 * Response structure for listing districts.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictListResponse {
    districts: Vec<DistrictElement>,
    pagination: PaginationResponse,
    /**
     * Whether the districts came from the database or the static fallback table.
     */
    source: DataSource,
}

impl From<&DistrictListOutputType> for DistrictListResponse {
    fn from(output: &DistrictListOutputType) -> Self {
        DistrictListResponse { districts: output.districts.iter().map(DistrictElement::from).collect(), pagination: PaginationResponse::from(&output.pagination), source: output.source }
    }
}

/**
 * Response structure for district detection.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectResponse {
    district: DistrictElement,
    /**
     * Great circle distance between the given coordinates and the district centroid.
     */
    distance_km: f64,
    source: DataSource,
}

impl From<DetectOutputType> for DetectResponse {
    fn from(output: DetectOutputType) -> Self {
        DetectResponse { district: DistrictElement::from(&output.district), distance_km: output.distance_km, source: output.source }
    }
}

/***************** Summary models *********************/

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub year: Option<i64>,
    pub months: Option<i64>,
}

/**
 * Aggregated figures of a district over a window of months.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    district: DistrictElement,
    month_count: i64,
    /**
     * Oldest month of the window as `YYYY-MM`.
     */
    first_period: Option<String>,
    /**
     * Newest month of the window as `YYYY-MM`.
     */
    last_period: Option<String>,
    households_registered: i64,
    total_households_work_provided: i64,
    total_persondays: i64,
    total_wages_paid: f64,
    avg_women_participation_pct: f64,
    avg_wage: f64,
    total_works_completed: i64,
    works_ongoing: i64,
}

impl From<&SummaryOutputType> for SummaryResponse {
    fn from(output: &SummaryOutputType) -> Self {
        SummaryResponse {
            district: DistrictElement::from(&output.district),
            month_count: output.month_count,
            first_period: output.first_period.clone(),
            last_period: output.last_period.clone(),
            households_registered: output.households_registered,
            total_households_work_provided: output.total_households_work_provided,
            total_persondays: output.total_persondays,
            total_wages_paid: output.total_wages_paid,
            avg_women_participation_pct: output.avg_women_participation_pct,
            avg_wage: output.avg_wage,
            total_works_completed: output.total_works_completed,
            works_ongoing: output.works_ongoing,
        }
    }
}

/***************** Monthly record models *********************/

#[derive(Debug, Deserialize)]
pub struct MonthsQuery {
    /**
     * Period key `year * 100 + month` of the last record seen.
     */
    pub cursor: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRecordElement {
    id: i64,
    district_id: i64,
    year: i64,
    month: i64,
    period: String,
    households_registered: i64,
    households_work_provided: i64,
    total_persondays: i64,
    wages_paid: f64,
    women_participation_pct: f64,
    works_completed: i64,
    works_ongoing: i64,
    avg_wage: f64,
    source_date: String,
}

impl From<&MonthlyRecordType> for MonthlyRecordElement {
    fn from(record: &MonthlyRecordType) -> Self {
        MonthlyRecordElement {
            id: record.id,
            district_id: record.district_id,
            year: record.year,
            month: record.month,
            period: format_period(record.year, record.month),
            households_registered: record.households_registered,
            households_work_provided: record.households_work_provided,
            total_persondays: record.total_persondays,
            wages_paid: record.wages_paid,
            women_participation_pct: record.women_participation_pct,
            works_completed: record.works_completed,
            works_ongoing: record.works_ongoing,
            avg_wage: record.avg_wage,
            source_date: record.source_date.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRecordListResponse {
    records: Vec<MonthlyRecordElement>,
    pagination: PaginationResponse,
}

impl From<&MonthlyRecordListOutputType> for MonthlyRecordListResponse {
    fn from(output: &MonthlyRecordListOutputType) -> Self {
        MonthlyRecordListResponse { records: output.records.iter().map(MonthlyRecordElement::from).collect(), pagination: PaginationResponse::from(&output.pagination) }
    }
}

/***************** Export models *********************/

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    /**
     * `csv` or `json`, json when missing.
     */
    pub format: Option<String>,
    pub year: Option<i64>,
}

/***************** Compare models *********************/

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    /**
     * Comma separated district ids.
     */
    pub district_ids: Option<String>,
    pub metric: Option<String>,
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricPointElement {
    period: String,
    value: f64,
}

impl From<&MetricPointType> for MetricPointElement {
    fn from(point: &MetricPointType) -> Self {
        MetricPointElement { period: point.period.clone(), value: point.value }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictComparisonElement {
    district_id: i64,
    district_name: String,
    /**
     * The metric aggregated over the period.
     */
    value: f64,
    /**
     * Monthly values in chronological order.
     */
    series: Vec<MetricPointElement>,
}

impl From<&DistrictComparisonType> for DistrictComparisonElement {
    fn from(comparison: &DistrictComparisonType) -> Self {
        DistrictComparisonElement {
            district_id: comparison.district_id,
            district_name: comparison.district_name.clone(),
            value: comparison.value,
            series: comparison.series.iter().map(MetricPointElement::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResponse {
    metric: String,
    aggregation: Aggregation,
    period: String,
    districts: Vec<DistrictComparisonElement>,
}

impl From<&ComparisonOutputType> for ComparisonResponse {
    fn from(output: &ComparisonOutputType) -> Self {
        ComparisonResponse {
            metric: output.metric.as_str().to_string(),
            aggregation: output.metric.aggregation(),
            period: output.period.label(),
            districts: output.districts.iter().map(DistrictComparisonElement::from).collect(),
        }
    }
}

/***************** Fetch log models *********************/

#[derive(Debug, Deserialize)]
pub struct FetchLogQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchLogElement {
    id: i64,
    source_url: String,
    status: String,
    started_at: chrono::DateTime<Utc>,
    finished_at: Option<chrono::DateTime<Utc>>,
    records_fetched: i64,
    error_message: Option<String>,
}

impl From<FetchLogType> for FetchLogElement {
    fn from(log: FetchLogType) -> Self {
        FetchLogElement {
            id: log.id,
            source_url: log.source_url,
            status: log.status,
            started_at: log.started_at,
            finished_at: log.finished_at,
            records_fetched: log.records_fetched,
            error_message: log.error_message,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchLogListResponse {
    fetch_logs: Vec<FetchLogElement>,
}

impl From<Vec<FetchLogType>> for FetchLogListResponse {
    fn from(logs: Vec<FetchLogType>) -> Self {
        FetchLogListResponse { fetch_logs: logs.into_iter().map(FetchLogElement::from).collect() }
    }
}

/***************** Health models *********************/

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /**
     * `ok` when the database answers, otherwise `degraded`.
     */
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    /**
     * `up` or `down`.
     */
    pub database: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ProbeResponse {
    pub status: &'static str,
}

/***************** Error models *********************/

/**
 * Custom error response for the application.
 */
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /**
     * Machine readable error kind.
     */
    pub error: &'static str,
    /**
     * The error code associated with the error type.
     */
    pub code: u16,
    /**
     * A human-readable message describing the error.
     */
    pub message: String,
}

impl ResponseError for ApplicationError {
    fn status_code(&self) -> StatusCode {
        get_statuscode(&self.error_type)
    }

    /**
     * Generates an error response for the application error.
     */
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse { error: self.error_type.as_str(), code: get_error_code(&self.error_type), message: self.message.clone() };
        HttpResponse::build(self.status_code()).json(&error_response)
    }
}

/**
* Maps application errors to HTTP status codes.
*
* # Arguments
* `application_error`: The type of error that occurred.
*
* # Returns
* The corresponding HTTP status code.
*/
fn get_statuscode(application_error: &ErrorType) -> StatusCode {
    match application_error {
        ErrorType::Validation => StatusCode::BAD_REQUEST,
        ErrorType::NotFound => StatusCode::NOT_FOUND,
        ErrorType::Upstream => StatusCode::BAD_GATEWAY,
        ErrorType::Initialization | ErrorType::DatabaseError | ErrorType::Application => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/**
 * Maps application errors to error codes.
 *
 * # Arguments
 * `application_error`: The type of error that occurred.
 *
 * # Returns
 * The corresponding error code.
 */
fn get_error_code(application_error: &ErrorType) -> u16 {
    match application_error {
        ErrorType::Initialization => 1001,
        ErrorType::Validation => 1002,
        ErrorType::DatabaseError => 1003,
        ErrorType::NotFound => 1004,
        ErrorType::Upstream => 1005,
        ErrorType::Application => 1006,
    }
}

/**
 * Query string extraction config that reports malformed parameters as validation errors.
 */
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _request| ApplicationError::new(ErrorType::Validation, format!("Invalid query parameters: {err}")).into())
}

/**
 * Path extraction config that reports malformed path segments as validation errors.
 */
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _request| ApplicationError::new(ErrorType::Validation, format!("Invalid path parameter: {err}")).into())
}

/***************** Common models *********************/

/**
 * Pagination response structure.
 */
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResponse {
    pub limit: i64,
    /**
     * Cursor of the next page, null on the last page.
     */
    pub next_cursor: Option<i64>,
    pub has_more: bool,
}

impl From<&PaginationOutput> for PaginationResponse {
    fn from(pagination_output: &PaginationOutput) -> Self {
        PaginationResponse { limit: pagination_output.limit, next_cursor: pagination_output.next_cursor, has_more: pagination_output.has_more }
    }
}

impl From<&DistrictListQuery> for PaginationInput {
    fn from(query: &DistrictListQuery) -> Self {
        PaginationInput::new(query.cursor, query.limit)
    }
}

impl From<&MonthsQuery> for PaginationInput {
    fn from(query: &MonthsQuery) -> Self {
        PaginationInput::new(query.cursor, query.limit)
    }
}
