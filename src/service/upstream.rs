use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    config::UpstreamConfig,
    models::round2,
};

/**
 * One district month as reported by the open data portal.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRecord {
    pub district_name: String,
    pub state_name: String,
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
}

#[derive(Debug, Deserialize)]
struct PortalResponse {
    #[serde(default)]
    records: Vec<Map<String, Value>>,
}

/**
 * Client for the resource api of the open data portal.
 */
pub struct UpstreamClient {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    /**
     * Creates the client. The request timeout is fixed here for the lifetime of the client.
     *
     * # Arguments
     * `config`: The upstream configuration.
     */
    pub fn new(config: &UpstreamConfig) -> Result<Self, ApplicationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to create http client: {err}")))?;
        Ok(UpstreamClient { client, config: config.clone() })
    }

    /**
     * Whether fetching is enabled and configured.
     */
    pub fn is_usable(&self) -> bool {
        self.config.is_usable()
    }

    /**
     * Resource url without credentials, used in fetch logs.
     */
    pub fn source_url(&self) -> String {
        format!("{}/resource/{}", self.config.base_url.trim_end_matches('/'), self.config.resource_id.as_deref().unwrap_or_default())
    }

    /**
     * Fetches all pages until a short page or the configured page maximum.
     *
     * # Returns
     * The parsed records. Rows that cannot be parsed are skipped.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn fetch_all(&self) -> Result<Vec<UpstreamRecord>, ApplicationError> {
        if !self.is_usable() {
            return Err(ApplicationError::new(ErrorType::Upstream, "Upstream is not configured".to_string()));
        }
        let mut records = Vec::new();
        let page_size = usize::try_from(self.config.page_size).unwrap_or(usize::MAX);
        for page in 0..self.config.max_pages {
            let offset = u64::from(page) * u64::from(self.config.page_size);
            let rows = self.fetch_page_with_retry(offset).await?;
            let row_count = rows.len();
            let parsed: Vec<UpstreamRecord> = rows.iter().filter_map(parse_record).collect();
            if parsed.len() < row_count {
                debug!("Skipped {} unparseable rows at offset {}", row_count - parsed.len(), offset);
            }
            records.extend(parsed);
            if row_count < page_size {
                break;
            }
        }
        tracing::Span::current().record("result", records.len());
        Ok(records)
    }

    async fn fetch_page_with_retry(&self, offset: u64) -> Result<Vec<Map<String, Value>>, ApplicationError> {
        let mut attempt = 0;
        loop {
            match self.fetch_page(offset).await {
                Ok(rows) => return Ok(rows),
                Err(err) if attempt < self.config.max_retries => {
                    let delay = backoff_delay(&self.config, attempt);
                    warn!("Upstream request at offset {} failed, retrying in {:?}: {}", offset, delay, err);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn fetch_page(&self, offset: u64) -> Result<Vec<Map<String, Value>>, ApplicationError> {
        let mut query = vec![
            ("api-key", self.config.api_key.clone().unwrap_or_default()),
            ("format", "json".to_string()),
            ("offset", offset.to_string()),
            ("limit", self.config.page_size.to_string()),
        ];
        if let Some(state) = &self.config.state_filter {
            query.push(("filters[state_name]", state.clone()));
        }
        let response = self
            .client
            .get(self.source_url())
            .query(&query)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| ApplicationError::new(ErrorType::Upstream, format!("Upstream request failed: {err}")))?;
        let body: PortalResponse = response.json().await.map_err(|err| ApplicationError::new(ErrorType::Upstream, format!("Invalid upstream response: {err}")))?;
        Ok(body.records)
    }
}

/**
 * Delay before retry number `attempt` (starting at 0): `base_delay_ms * 2^attempt`, capped at `max_delay_ms`.
 */
pub fn backoff_delay(config: &UpstreamConfig, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt);
    Duration::from_millis(config.base_delay_ms.saturating_mul(factor).min(config.max_delay_ms))
}

/**
 * Parses one portal row. Numbers may be sent as json numbers or as strings.
 *
 * # Returns
 * The record, or `None` when district, state or period are missing.
 */
pub fn parse_record(row: &Map<String, Value>) -> Option<UpstreamRecord> {
    let district_name = text_field(row, "district_name")?;
    let state_name = text_field(row, "state_name")?;
    let month = month_number(&text_field(row, "month")?)?;
    let year = calendar_year(&text_field(row, "fin_year")?, month)?;
    let total_persondays = integer_field(row, "Persondays_of_Central_Liability_so_far");
    let women_persondays = number_field(row, "Women_Persondays");
    #[allow(clippy::cast_precision_loss)]
    let women_participation_pct = if total_persondays > 0 { round2(women_persondays / total_persondays as f64 * 100.0) } else { 0.0 };
    Some(UpstreamRecord {
        district_name,
        state_name,
        year,
        month,
        households_registered: integer_field(row, "Total_No_of_JobCards_issued"),
        households_work_provided: integer_field(row, "Total_Households_Worked"),
        total_persondays,
        wages_paid: number_field(row, "Wages"),
        women_participation_pct,
        works_completed: integer_field(row, "Number_of_Completed_Works"),
        works_ongoing: integer_field(row, "Number_of_Ongoing_Works"),
        avg_wage: number_field(row, "Average_Wage_rate_per_day_per_person"),
    })
}

/**
 * Maps a month name, abbreviation or number to 1..=12.
 */
fn month_number(value: &str) -> Option<i64> {
    let value = value.trim().to_ascii_lowercase();
    if let Ok(number) = value.parse::<i64>() {
        return (1..=12).contains(&number).then_some(number);
    }
    const MONTHS: [&str; 12] = ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];
    let prefix = value.get(..3)?;
    MONTHS.iter().position(|month| *month == prefix).and_then(|index| i64::try_from(index + 1).ok())
}

/**
 * Calendar year of a month in an Indian financial year such as `2024-2025`. April to December belong to the
 * first year, January to March to the second.
 */
fn calendar_year(fin_year: &str, month: i64) -> Option<i64> {
    let start = fin_year.trim().split('-').next()?.trim().parse::<i64>().ok()?;
    if month >= 4 { Some(start) } else { Some(start + 1) }
}

fn text_field(row: &Map<String, Value>, name: &str) -> Option<String> {
    match row.get(name)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn number_field(row: &Map<String, Value>, name: &str) -> f64 {
    match row.get(name) {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(text)) => text.trim().replace(',', "").parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
    .max(0.0)
}

#[allow(clippy::cast_possible_truncation)]
fn integer_field(row: &Map<String, Value>, name: &str) -> i64 {
    number_field(row, name).round() as i64
}
