use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::apperror::{ApplicationError, ErrorType};

/**
 * Default number of elements in a page.
 */
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/**
 * Maximum number of elements in a page.
 */
pub const MAX_PAGE_SIZE: i64 = 100;

/**
 * Default number of months in a summary window.
 */
pub const DEFAULT_SUMMARY_MONTHS: i64 = 12;

/**
 * Maximum number of months in a summary window.
 */
pub const MAX_SUMMARY_MONTHS: i64 = 60;

/**
 * Maximum number of districts in one comparison.
 */
pub const MAX_COMPARE_DISTRICTS: usize = 10;

/***************** Common types *********************/

/**
 * Cursor based pagination input. The cursor is the key of the last element seen by the client.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationInput {
    pub cursor: Option<i64>,
    pub limit: i64,
}

impl PaginationInput {
    pub fn new(cursor: Option<i64>, limit: Option<i64>) -> Self {
        PaginationInput { cursor, limit: limit.unwrap_or(DEFAULT_PAGE_SIZE) }
    }

    /**
     * Validates the pagination input.
     *
     * # Returns
     * The validated input or a validation error.
     */
    pub fn validate(self) -> Result<Self, ApplicationError> {
        if self.limit < 1 || self.limit > MAX_PAGE_SIZE {
            return Err(ApplicationError::new(ErrorType::Validation, format!("limit must be between 1 and {MAX_PAGE_SIZE}")));
        }
        if self.cursor.is_some_and(|cursor| cursor < 0) {
            return Err(ApplicationError::new(ErrorType::Validation, "cursor must not be negative".to_string()));
        }
        Ok(self)
    }
}

/**
 * Pagination output returned together with a page.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationOutput {
    pub limit: i64,
    pub next_cursor: Option<i64>,
    pub has_more: bool,
}

impl PaginationOutput {
    pub fn new(limit: i64, next_cursor: Option<i64>, has_more: bool) -> Self {
        PaginationOutput { limit, next_cursor, has_more }
    }
}

/**
 * Cuts a page fetched with `limit + 1` rows down to `limit` and computes the pagination output.
 *
 * # Arguments
 * `elements`: The fetched rows, at most `limit + 1`.
 * `limit`: The requested page size.
 * `key`: Returns the cursor key of an element.
 */
pub fn paginate<T>(mut elements: Vec<T>, limit: i64, key: impl Fn(&T) -> i64) -> (Vec<T>, PaginationOutput) {
    let page_size = usize::try_from(limit).unwrap_or(0);
    let has_more = elements.len() > page_size;
    elements.truncate(page_size);
    let next_cursor = if has_more { elements.last().map(key) } else { None };
    (elements, PaginationOutput::new(limit, next_cursor, has_more))
}

/**
 * Where a response got its data from.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Database,
    Fallback,
}

/***************** District types *********************/

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictDetailType {
    pub id: i64,
    pub name: String,
    pub state_code: String,
    pub state_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub iso_code: String,
}

impl DistrictDetailType {
    pub fn new(id: i64, name: String, state_code: String, state_name: String, latitude: f64, longitude: f64, iso_code: String) -> Self {
        DistrictDetailType { id, name, state_code, state_name, latitude, longitude, iso_code }
    }
}

/**
 * District as inserted by the seeding step.
 */
#[derive(Debug, Clone)]
pub struct DistrictAddInputType {
    pub name: String,
    pub state_code: String,
    pub state_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub iso_code: String,
}

/**
 * Filter for the district list.
 */
#[derive(Debug, Clone, Default)]
pub struct DistrictListInputType {
    pub search: Option<String>,
}

impl DistrictListInputType {
    /**
     * Trims the search term and treats an empty term as no filter.
     */
    pub fn new(search: Option<String>) -> Self {
        let search = search.map(|term| term.trim().to_string()).filter(|term| !term.is_empty());
        DistrictListInputType { search }
    }

    pub fn validate(self) -> Result<Self, ApplicationError> {
        if self.search.as_ref().is_some_and(|term| term.chars().count() > 100) {
            return Err(ApplicationError::new(ErrorType::Validation, "search must be at most 100 characters".to_string()));
        }
        Ok(self)
    }

    /**
     * Substring match on district or state name. Case is folded for ASCII letters only, as sqlite `LIKE` does.
     */
    pub fn matches(&self, district: &DistrictDetailType) -> bool {
        match &self.search {
            None => true,
            Some(term) => {
                let term = term.to_ascii_lowercase();
                district.name.to_ascii_lowercase().contains(&term) || district.state_name.to_ascii_lowercase().contains(&term)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DistrictListOutputType {
    pub districts: Vec<DistrictDetailType>,
    pub pagination: PaginationOutput,
    pub source: DataSource,
}

impl DistrictListOutputType {
    pub fn new(districts: Vec<DistrictDetailType>, pagination: PaginationOutput, source: DataSource) -> Self {
        DistrictListOutputType { districts, pagination, source }
    }
}

/**
 * Coordinates used for district detection.
 */
#[derive(Debug, Clone, Copy)]
pub struct DetectInputType {
    pub latitude: f64,
    pub longitude: f64,
}

impl DetectInputType {
    pub fn validate(self) -> Result<Self, ApplicationError> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(ApplicationError::new(ErrorType::Validation, "lat and lng must be finite numbers".to_string()));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct DetectOutputType {
    pub district: DistrictDetailType,
    pub distance_km: f64,
    pub source: DataSource,
}

/***************** Monthly record types *********************/

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRecordType {
    pub id: i64,
    pub district_id: i64,
    pub year: i64,
    pub month: i64,
    pub households_registered: i64,
    pub households_work_provided: i64,
    pub total_persondays: i64,
    pub wages_paid: f64,
    pub women_participation_pct: f64,
    pub works_completed: i64,
    pub works_ongoing: i64,
    pub avg_wage: f64,
    pub source_date: String,
}

impl MonthlyRecordType {
    /**
     * Sortable key of the month, `year * 100 + month`. Used as pagination cursor.
     */
    pub fn period_key(&self) -> i64 {
        self.year * 100 + self.month
    }

    /**
     * Returns the value of a metric for this month.
     */
    #[allow(clippy::cast_precision_loss)]
    pub fn metric_value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::HouseholdsRegistered => self.households_registered as f64,
            Metric::HouseholdsWorkProvided => self.households_work_provided as f64,
            Metric::TotalPersondays => self.total_persondays as f64,
            Metric::WagesPaid => self.wages_paid,
            Metric::WomenParticipationPct => self.women_participation_pct,
            Metric::WorksCompleted => self.works_completed as f64,
            Metric::WorksOngoing => self.works_ongoing as f64,
            Metric::AvgWage => self.avg_wage,
        }
    }
}

/**
 * Monthly record as written by the synchronisation or seeding step.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyRecordUpsertType {
    pub district_id: i64,
    pub year: i64,
    pub month: i64,
    pub households_registered: i64,
    pub households_work_provided: i64,
    pub total_persondays: i64,
    pub wages_paid: f64,
    pub women_participation_pct: f64,
    pub works_completed: i64,
    pub works_ongoing: i64,
    pub avg_wage: f64,
    pub source_date: String,
}

#[derive(Debug, Clone)]
pub struct MonthlyRecordListOutputType {
    pub records: Vec<MonthlyRecordType>,
    pub pagination: PaginationOutput,
}

impl MonthlyRecordListOutputType {
    pub fn new(records: Vec<MonthlyRecordType>, pagination: PaginationOutput) -> Self {
        MonthlyRecordListOutputType { records, pagination }
    }
}

/***************** Summary types *********************/

#[derive(Debug, Clone)]
pub struct SummaryInputType {
    pub year: Option<i64>,
    pub months: i64,
}

impl SummaryInputType {
    pub fn new(year: Option<i64>, months: Option<i64>) -> Self {
        SummaryInputType { year, months: months.unwrap_or(DEFAULT_SUMMARY_MONTHS) }
    }

    pub fn validate(self) -> Result<Self, ApplicationError> {
        if self.months < 1 || self.months > MAX_SUMMARY_MONTHS {
            return Err(ApplicationError::new(ErrorType::Validation, format!("months must be between 1 and {MAX_SUMMARY_MONTHS}")));
        }
        validate_year(self.year)?;
        Ok(self)
    }
}

fn validate_year(year: Option<i64>) -> Result<(), ApplicationError> {
    if year.is_some_and(|year| !(2000..=2100).contains(&year)) {
        return Err(ApplicationError::new(ErrorType::Validation, "year must be between 2000 and 2100".to_string()));
    }
    Ok(())
}

/**
 * Aggregate over a window of monthly records.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOutputType {
    pub district: DistrictDetailType,
    pub month_count: i64,
    pub first_period: Option<String>,
    pub last_period: Option<String>,
    pub households_registered: i64,
    pub total_households_work_provided: i64,
    pub total_persondays: i64,
    pub total_wages_paid: f64,
    pub avg_women_participation_pct: f64,
    pub avg_wage: f64,
    pub total_works_completed: i64,
    pub works_ongoing: i64,
}

/**
 * Formats a year and month as `YYYY-MM`.
 */
pub fn format_period(year: i64, month: i64) -> String {
    format!("{year:04}-{month:02}")
}

/**
 * Rounds to two decimals.
 */
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/***************** Comparison types *********************/

/**
 * Numeric monthly record fields that can be compared.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    HouseholdsRegistered,
    HouseholdsWorkProvided,
    TotalPersondays,
    WagesPaid,
    WomenParticipationPct,
    WorksCompleted,
    WorksOngoing,
    AvgWage,
}

/**
 * How monthly values of a metric are combined into one value.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Average,
    Latest,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::HouseholdsRegistered => "households_registered",
            Metric::HouseholdsWorkProvided => "households_work_provided",
            Metric::TotalPersondays => "total_persondays",
            Metric::WagesPaid => "wages_paid",
            Metric::WomenParticipationPct => "women_participation_pct",
            Metric::WorksCompleted => "works_completed",
            Metric::WorksOngoing => "works_ongoing",
            Metric::AvgWage => "avg_wage",
        }
    }

    pub fn aggregation(self) -> Aggregation {
        match self {
            Metric::HouseholdsWorkProvided | Metric::TotalPersondays | Metric::WagesPaid | Metric::WorksCompleted => Aggregation::Sum,
            Metric::WomenParticipationPct | Metric::AvgWage => Aggregation::Average,
            Metric::HouseholdsRegistered | Metric::WorksOngoing => Aggregation::Latest,
        }
    }
}

impl FromStr for Metric {
    type Err = ApplicationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "households_registered" => Ok(Metric::HouseholdsRegistered),
            "households_work_provided" => Ok(Metric::HouseholdsWorkProvided),
            "total_persondays" | "persondays" => Ok(Metric::TotalPersondays),
            "wages_paid" | "wages" => Ok(Metric::WagesPaid),
            "women_participation_pct" | "women_participation" => Ok(Metric::WomenParticipationPct),
            "works_completed" => Ok(Metric::WorksCompleted),
            "works_ongoing" => Ok(Metric::WorksOngoing),
            "avg_wage" => Ok(Metric::AvgWage),
            other => Err(ApplicationError::new(ErrorType::Validation, format!("Unknown metric {other}"))),
        }
    }
}

/**
 * Time window of a comparison.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /**
     * The most recent N months of each district.
     */
    RecentMonths(i64),
    /**
     * All months of a calendar year.
     */
    Year(i64),
}

impl Period {
    pub fn label(self) -> String {
        match self {
            Period::RecentMonths(months) => format!("{months}m"),
            Period::Year(year) => year.to_string(),
        }
    }
}

impl FromStr for Period {
    type Err = ApplicationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "3m" => Ok(Period::RecentMonths(3)),
            "6m" => Ok(Period::RecentMonths(6)),
            "12m" => Ok(Period::RecentMonths(12)),
            other => {
                let year = other.parse::<i64>().map_err(|_err| ApplicationError::new(ErrorType::Validation, format!("Unknown period {other}, expected 3m, 6m, 12m or a year")))?;
                validate_year(Some(year))?;
                Ok(Period::Year(year))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompareInputType {
    pub district_ids: Vec<i64>,
    pub metric: Metric,
    pub period: Period,
}

impl CompareInputType {
    /**
     * Parses the raw query values. Duplicate ids are collapsed keeping the first occurrence.
     */
    pub fn parse(district_ids: &str, metric: Option<&str>, period: Option<&str>) -> Result<Self, ApplicationError> {
        let mut ids: Vec<i64> = Vec::new();
        for part in district_ids.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            let id = part.parse::<i64>().map_err(|_err| ApplicationError::new(ErrorType::Validation, format!("Invalid district id {part}")))?;
            if id < 1 {
                return Err(ApplicationError::new(ErrorType::Validation, format!("Invalid district id {part}")));
            }
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if ids.is_empty() || ids.len() > MAX_COMPARE_DISTRICTS {
            return Err(ApplicationError::new(ErrorType::Validation, format!("district_ids must contain between 1 and {MAX_COMPARE_DISTRICTS} ids")));
        }
        let metric = metric.filter(|metric| !metric.trim().is_empty()).map_or(Ok(Metric::TotalPersondays), Metric::from_str)?;
        let period = period.filter(|period| !period.trim().is_empty()).map_or(Ok(Period::RecentMonths(12)), Period::from_str)?;
        Ok(CompareInputType { district_ids: ids, metric, period })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricPointType {
    pub period: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistrictComparisonType {
    pub district_id: i64,
    pub district_name: String,
    pub value: f64,
    pub series: Vec<MetricPointType>,
}

#[derive(Debug, Clone)]
pub struct ComparisonOutputType {
    pub metric: Metric,
    pub period: Period,
    pub districts: Vec<DistrictComparisonType>,
}

/***************** Export types *********************/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl FromStr for ExportFormat {
    type Err = ApplicationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(ApplicationError::new(ErrorType::Validation, format!("Unknown export format {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportInputType {
    pub format: ExportFormat,
    pub year: Option<i64>,
}

impl ExportInputType {
    pub fn parse(format: Option<&str>, year: Option<i64>) -> Result<Self, ApplicationError> {
        let format = format.map_or(Ok(ExportFormat::Json), ExportFormat::from_str)?;
        validate_year(year)?;
        Ok(ExportInputType { format, year })
    }
}

/***************** Fetch log types *********************/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Running,
    Success,
    Failed,
    Skipped,
    Fallback,
}

impl FetchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchStatus::Running => "running",
            FetchStatus::Success => "success",
            FetchStatus::Failed => "failed",
            FetchStatus::Skipped => "skipped",
            FetchStatus::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchLogType {
    pub id: i64,
    pub source_url: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub records_fetched: i64,
    pub error_message: Option<String>,
}

/**
 * Number of most recent fetch log rows to list.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct FetchLogInputType {
    pub limit: i64,
}

impl FetchLogInputType {
    pub fn new(limit: Option<i64>) -> Self {
        FetchLogInputType { limit: limit.unwrap_or(DEFAULT_PAGE_SIZE) }
    }

    pub fn validate(self) -> Result<Self, ApplicationError> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.limit) {
            return Err(ApplicationError::new(ErrorType::Validation, format!("limit must be between 1 and {MAX_PAGE_SIZE}")));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_paginate_has_more() {
        let (page, pagination) = paginate(vec![1, 2, 3, 4], 3, |value| i64::from(*value));
        assert_eq!(page, vec![1, 2, 3]);
        assert!(pagination.has_more);
        assert_eq!(pagination.next_cursor, Some(3));
        assert_eq!(pagination.limit, 3);
    }

    #[test]
    fn test_paginate_has_no_more() {
        let (page, pagination) = paginate(vec![1, 2, 3], 3, |value| i64::from(*value));
        assert_eq!(page, vec![1, 2, 3]);
        assert!(!pagination.has_more);
        assert_eq!(pagination.next_cursor, None);
    }

    #[test]
    fn test_pagination_input_validation() {
        assert!(PaginationInput::new(None, None).validate().is_ok());
        assert_eq!(PaginationInput::new(None, None).limit, DEFAULT_PAGE_SIZE);
        assert!(PaginationInput::new(None, Some(0)).validate().is_err());
        assert!(PaginationInput::new(None, Some(101)).validate().is_err());
        assert!(PaginationInput::new(Some(-1), Some(10)).validate().is_err());
    }

    #[test]
    fn test_district_search_matches() {
        let district = DistrictDetailType::new(1, "Lucknow".to_string(), "09".to_string(), "Uttar Pradesh".to_string(), 26.8, 80.9, "IN-UP".to_string());
        assert!(DistrictListInputType::new(Some("luck".to_string())).matches(&district));
        assert!(DistrictListInputType::new(Some("uttar".to_string())).matches(&district));
        assert!(DistrictListInputType::new(Some("  ".to_string())).matches(&district));
        assert!(!DistrictListInputType::new(Some("agra".to_string())).matches(&district));
    }

    #[test]
    fn test_district_search_folds_ascii_case_only() {
        let district = DistrictDetailType::new(11, "Ōrai".to_string(), "09".to_string(), "Uttar Pradesh".to_string(), 25.99, 79.45, "IN-UP".to_string());
        assert!(DistrictListInputType::new(Some("ŌRAI".to_string())).matches(&district));
        assert!(!DistrictListInputType::new(Some("ōrai".to_string())).matches(&district));
    }

    #[test]
    fn test_fetch_log_input_validation() {
        assert_eq!(FetchLogInputType::new(None).validate().unwrap().limit, DEFAULT_PAGE_SIZE);
        assert_eq!(FetchLogInputType::new(Some(MAX_PAGE_SIZE)).validate().unwrap().limit, MAX_PAGE_SIZE);
        assert_eq!(FetchLogInputType::new(Some(0)).validate().unwrap_err().error_type, ErrorType::Validation);
        assert!(FetchLogInputType::new(Some(MAX_PAGE_SIZE + 1)).validate().is_err());
    }

    #[test]
    fn test_detect_rejects_nan() {
        assert!(DetectInputType { latitude: f64::NAN, longitude: 80.0 }.validate().is_err());
        assert!(DetectInputType { latitude: 26.0, longitude: f64::INFINITY }.validate().is_err());
        assert!(DetectInputType { latitude: 26.0, longitude: 80.0 }.validate().is_ok());
    }

    #[test]
    fn test_compare_input_parse() {
        let input = CompareInputType::parse("3, 1,3,2", Some("wages_paid"), Some("6m")).unwrap();
        assert_eq!(input.district_ids, vec![3, 1, 2]);
        assert_eq!(input.metric, Metric::WagesPaid);
        assert_eq!(input.period, Period::RecentMonths(6));

        let input = CompareInputType::parse("1", None, Some("2024")).unwrap();
        assert_eq!(input.metric, Metric::TotalPersondays);
        assert_eq!(input.period, Period::Year(2024));
    }

    #[test]
    fn test_compare_input_parse_errors() {
        assert!(CompareInputType::parse("", None, None).is_err());
        assert!(CompareInputType::parse("1,x", None, None).is_err());
        assert!(CompareInputType::parse("0", None, None).is_err());
        assert!(CompareInputType::parse("1,2,3,4,5,6,7,8,9,10,11", None, None).is_err());
        assert!(CompareInputType::parse("1", Some("height"), None).is_err());
        assert!(CompareInputType::parse("1", None, Some("5m")).is_err());
    }

    #[test]
    fn test_metric_aggregation() {
        assert_eq!(Metric::TotalPersondays.aggregation(), Aggregation::Sum);
        assert_eq!(Metric::AvgWage.aggregation(), Aggregation::Average);
        assert_eq!(Metric::HouseholdsRegistered.aggregation(), Aggregation::Latest);
        assert_eq!(Metric::from_str(Metric::WorksOngoing.as_str()).unwrap(), Metric::WorksOngoing);
    }

    #[test]
    fn test_summary_input_validation() {
        assert!(SummaryInputType::new(None, None).validate().is_ok());
        assert!(SummaryInputType::new(Some(2024), Some(60)).validate().is_ok());
        assert!(SummaryInputType::new(None, Some(61)).validate().is_err());
        assert!(SummaryInputType::new(Some(1999), None).validate().is_err());
    }

    #[test]
    fn test_export_input_parse() {
        assert_eq!(ExportInputType::parse(None, None).unwrap().format, ExportFormat::Json);
        assert_eq!(ExportInputType::parse(Some("CSV"), Some(2024)).unwrap().format, ExportFormat::Csv);
        assert!(ExportInputType::parse(Some("pdf"), None).is_err());
    }

    #[test]
    fn test_format_period_and_round() {
        assert_eq!(format_period(2024, 3), "2024-03");
        assert!((round2(1.23456) - 1.23).abs() < f64::EPSILON);
    }
}
