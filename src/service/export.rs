use serde::{Deserialize, Serialize};

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    models::{DistrictDetailType, ExportFormat, MonthlyRecordType},
};

/**
 * Csv header, in `ExportRow` field order.
 */
const EXPORT_COLUMNS: [&str; 14] = [
    "district_id",
    "district_name",
    "state_name",
    "year",
    "month",
    "households_registered",
    "households_work_provided",
    "total_persondays",
    "wages_paid",
    "women_participation_pct",
    "works_completed",
    "works_ongoing",
    "avg_wage",
    "source_date",
];

/**
 * One exported row. Flat so that the same shape works for csv and json.
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub district_id: i64,
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
    pub source_date: String,
}

impl ExportRow {
    fn new(district: &DistrictDetailType, record: &MonthlyRecordType) -> Self {
        ExportRow {
            district_id: district.id,
            district_name: district.name.clone(),
            state_name: district.state_name.clone(),
            year: record.year,
            month: record.month,
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

/**
 * A rendered export ready to be sent as an attachment.
 */
#[derive(Debug, Clone)]
pub struct ExportOutputType {
    pub content_type: &'static str,
    pub file_name: String,
    pub body: Vec<u8>,
}

/**
 * Renders the records of a district in the requested format.
 *
 * # Arguments
 * `district`: The district.
 * `records`: Its records in chronological order.
 * `format`: Csv or json.
 * `year`: The year filter used, only used in the file name.
 */
pub fn render(district: &DistrictDetailType, records: &[MonthlyRecordType], format: ExportFormat, year: Option<i64>) -> Result<ExportOutputType, ApplicationError> {
    let rows: Vec<ExportRow> = records.iter().map(|record| ExportRow::new(district, record)).collect();
    let base_name = match year {
        Some(year) => format!("mgnrega_{}_{year}", slug(&district.name)),
        None => format!("mgnrega_{}", slug(&district.name)),
    };
    match format {
        ExportFormat::Json => {
            let body = serde_json::to_vec_pretty(&rows).map_err(|err| ApplicationError::new(ErrorType::Application, format!("Failed to render json export: {err}")))?;
            Ok(ExportOutputType { content_type: "application/json", file_name: format!("{base_name}.json"), body })
        }
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            // The header is otherwise only written together with the first row.
            if rows.is_empty() {
                writer.write_record(EXPORT_COLUMNS).map_err(|err| ApplicationError::new(ErrorType::Application, format!("Failed to render csv export: {err}")))?;
            }
            for row in &rows {
                writer.serialize(row).map_err(|err| ApplicationError::new(ErrorType::Application, format!("Failed to render csv export: {err}")))?;
            }
            let body = writer.into_inner().map_err(|err| ApplicationError::new(ErrorType::Application, format!("Failed to finish csv export: {err}")))?;
            Ok(ExportOutputType { content_type: "text/csv; charset=utf-8", file_name: format!("{base_name}.csv"), body })
        }
    }
}

fn slug(name: &str) -> String {
    name.chars().map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' }).collect()
}
