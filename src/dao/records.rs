use sqlx::SqliteConnection;
use tracing::{Instrument, instrument};

use crate::dao::handle_database_error;
use crate::model::{
    apperror::{ApplicationError, ErrorType},
    models::{MonthlyRecordListOutputType, MonthlyRecordType, MonthlyRecordUpsertType, PaginationInput, paginate},
};

/**
 * Database response type for querying monthly records.
 */
pub type QueryMonthlyRecordDbResp = (i64, i64, i64, i64, i64, i64, i64, f64, f64, i64, i64, f64, String);

/**
 * SQL query to retrieve a page of monthly records of a district, newest first.
 * The cursor is the period key `year * 100 + month` of the last record seen.
 */
const QUERY_RECORD_LIST: &str = "SELECT id, district_id, year, month, households_registered, households_work_provided, total_persondays, wages_paid, women_participation_pct, works_completed, works_ongoing, avg_wage, source_date
                                 FROM monthly_record
                                 WHERE district_id = ?1 AND (?2 IS NULL OR year * 100 + month < ?2)
                                 ORDER BY year DESC, month DESC
                                 LIMIT ?3";

/**
 * SQL query to retrieve the most recent records of a district, optionally within one year.
 */
const QUERY_RECENT_RECORDS: &str = "SELECT id, district_id, year, month, households_registered, households_work_provided, total_persondays, wages_paid, women_participation_pct, works_completed, works_ongoing, avg_wage, source_date
                                    FROM monthly_record
                                    WHERE district_id = ?1 AND (?2 IS NULL OR year = ?2)
                                    ORDER BY year DESC, month DESC
                                    LIMIT ?3";

/**
 * SQL query to retrieve all records of a district in chronological order, optionally within one year.
 */
const QUERY_RECORDS_CHRONOLOGICAL: &str = "SELECT id, district_id, year, month, households_registered, households_work_provided, total_persondays, wages_paid, women_participation_pct, works_completed, works_ongoing, avg_wage, source_date
                                           FROM monthly_record
                                           WHERE district_id = ?1 AND (?2 IS NULL OR year = ?2)
                                           ORDER BY year, month";

/**
 * SQL query to insert a record or replace the figures of the stored one for the same month.
 */
const UPSERT_RECORD: &str = "INSERT INTO monthly_record (district_id, year, month, households_registered, households_work_provided, total_persondays, wages_paid, women_participation_pct, works_completed, works_ongoing, avg_wage, source_date)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                             ON CONFLICT (district_id, year, month) DO UPDATE SET
                                households_registered = excluded.households_registered,
                                households_work_provided = excluded.households_work_provided,
                                total_persondays = excluded.total_persondays,
                                wages_paid = excluded.wages_paid,
                                women_participation_pct = excluded.women_participation_pct,
                                works_completed = excluded.works_completed,
                                works_ongoing = excluded.works_ongoing,
                                avg_wage = excluded.avg_wage,
                                source_date = excluded.source_date";

/**
 * SQL query to count all records.
 */
const COUNT_RECORDS: &str = "SELECT COUNT(*) FROM monthly_record";

impl From<QueryMonthlyRecordDbResp> for MonthlyRecordType {
    fn from(row: QueryMonthlyRecordDbResp) -> Self {
        MonthlyRecordType {
            id: row.0,
            district_id: row.1,
            year: row.2,
            month: row.3,
            households_registered: row.4,
            households_work_provided: row.5,
            total_persondays: row.6,
            wages_paid: row.7,
            women_participation_pct: row.8,
            works_completed: row.9,
            works_ongoing: row.10,
            avg_wage: row.11,
            source_date: row.12,
        }
    }
}

/**
 * DAO for monthly record related database operations.
 */
pub struct MonthlyRecordDao {}

impl MonthlyRecordDao {
    /**
     * Creates a new instance of `MonthlyRecordDao`.
     */
    pub fn new() -> Self {
        MonthlyRecordDao {}
    }

    /**
     * Retrieves a page of monthly records of a district, newest first.
     *
     * # Arguments
     * `connection`: The database connection.
     * `district_id`: The district.
     * `pagination_input`: Cursor (period key) and page size.
     *
     * # Returns
     * A Result containing `MonthlyRecordListOutputType` or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_record_list(&self, connection: &mut SqliteConnection, district_id: i64, pagination_input: &PaginationInput) -> Result<MonthlyRecordListOutputType, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryMonthlyRecordDbResp> = sqlx::query_as(QUERY_RECORD_LIST)
            .bind(district_id)
            .bind(pagination_input.cursor)
            .bind(pagination_input.limit + 1)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get monthly records: {err}")))?;
        let elements: Vec<MonthlyRecordType> = results.into_iter().map(MonthlyRecordType::from).collect();
        let (records, pagination) = paginate(elements, pagination_input.limit, MonthlyRecordType::period_key);
        Ok(MonthlyRecordListOutputType::new(records, pagination))
    }

    /**
     * Retrieves the most recent records of a district, newest first.
     *
     * # Arguments
     * `connection`: The database connection.
     * `district_id`: The district.
     * `year`: Optional calendar year restriction.
     * `months`: Maximum number of records.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_recent_records(&self, connection: &mut SqliteConnection, district_id: i64, year: Option<i64>, months: i64) -> Result<Vec<MonthlyRecordType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryMonthlyRecordDbResp> = sqlx::query_as(QUERY_RECENT_RECORDS)
            .bind(district_id)
            .bind(year)
            .bind(months)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get recent records: {err}")))?;
        Ok(results.into_iter().map(MonthlyRecordType::from).collect())
    }

    /**
     * Retrieves all records of a district in chronological order.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_records_chronological(&self, connection: &mut SqliteConnection, district_id: i64, year: Option<i64>) -> Result<Vec<MonthlyRecordType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryMonthlyRecordDbResp> = sqlx::query_as(QUERY_RECORDS_CHRONOLOGICAL)
            .bind(district_id)
            .bind(year)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get records: {err}")))?;
        Ok(results.into_iter().map(MonthlyRecordType::from).collect())
    }

    /**
     * Inserts a record or replaces the figures of the stored record for the same district and month.
     */
    #[instrument(skip(self, transaction, record), fields(district_id = record.district_id, year = record.year, month = record.month))]
    pub async fn upsert_record(&self, transaction: &mut SqliteConnection, record: &MonthlyRecordUpsertType) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        sqlx::query(UPSERT_RECORD)
            .bind(record.district_id)
            .bind(record.year)
            .bind(record.month)
            .bind(record.households_registered)
            .bind(record.households_work_provided)
            .bind(record.total_persondays)
            .bind(record.wages_paid)
            .bind(record.women_participation_pct)
            .bind(record.works_completed)
            .bind(record.works_ongoing)
            .bind(record.avg_wage)
            .bind(&record.source_date)
            .execute(transaction)
            .instrument(span)
            .await
            .map_err(|err| handle_database_error(err.as_database_error()))?;
        Ok(())
    }

    /**
     * Counts all stored records.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn count_records(&self, connection: &mut SqliteConnection) -> Result<i64, ApplicationError> {
        let span = tracing::Span::current();
        let count: (i64,) = sqlx::query_as(COUNT_RECORDS)
            .fetch_one(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to count records: {err}")))?;
        Ok(count.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dao::test_support::{SEED_MONTHS, init_db, init_seeded_db};

    #[tokio::test]
    async fn test_record_pages_reproduce_full_set() {
        let pool = init_seeded_db().await;
        let dao = MonthlyRecordDao::new();
        let mut connection = pool.acquire().await.unwrap();
        let all = dao.get_recent_records(&mut connection, 2, None, 1_000).await.unwrap();
        assert_eq!(all.len(), SEED_MONTHS as usize);
        for limit in [1, 5, 7, 24, 100] {
            let mut collected: Vec<MonthlyRecordType> = Vec::new();
            let mut cursor = None;
            loop {
                let page = dao.get_record_list(&mut connection, 2, &PaginationInput::new(cursor, Some(limit))).await.unwrap();
                assert!(page.records.len() <= usize::try_from(limit).unwrap());
                collected.extend(page.records);
                match page.pagination.next_cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
            assert_eq!(collected, all, "limit {limit}");
        }
    }

    #[tokio::test]
    async fn test_records_are_newest_first() {
        let pool = init_seeded_db().await;
        let mut connection = pool.acquire().await.unwrap();
        let records = MonthlyRecordDao::new().get_recent_records(&mut connection, 1, None, 6).await.unwrap();
        assert_eq!(records.len(), 6);
        for pair in records.windows(2) {
            assert!(pair[0].period_key() > pair[1].period_key());
        }
        assert_eq!(records[0].period_key(), 202_412);
    }

    #[tokio::test]
    async fn test_records_chronological_year_filter() {
        let pool = init_seeded_db().await;
        let mut connection = pool.acquire().await.unwrap();
        let records = MonthlyRecordDao::new().get_records_chronological(&mut connection, 1, Some(2024)).await.unwrap();
        assert_eq!(records.len(), 12);
        assert_eq!(records.first().unwrap().month, 1);
        assert_eq!(records.last().unwrap().month, 12);
        assert!(records.iter().all(|record| record.year == 2024));
    }

    #[tokio::test]
    async fn test_upsert_record_replaces_figures() {
        let pool = init_seeded_db().await;
        let dao = MonthlyRecordDao::new();
        let mut connection = pool.acquire().await.unwrap();
        let before = dao.count_records(&mut connection).await.unwrap();
        let mut record = MonthlyRecordUpsertType {
            district_id: 1,
            year: 2024,
            month: 12,
            households_registered: 1,
            households_work_provided: 1,
            total_persondays: 42,
            wages_paid: 1.5,
            women_participation_pct: 50.0,
            works_completed: 1,
            works_ongoing: 1,
            avg_wage: 250.0,
            source_date: "2025-01-05".to_string(),
        };
        dao.upsert_record(&mut connection, &record).await.unwrap();
        record.total_persondays = 43;
        dao.upsert_record(&mut connection, &record).await.unwrap();
        assert_eq!(dao.count_records(&mut connection).await.unwrap(), before);
        let latest = dao.get_recent_records(&mut connection, 1, None, 1).await.unwrap();
        assert_eq!(latest[0].total_persondays, 43);
        assert_eq!(latest[0].source_date, "2025-01-05");
    }

    #[tokio::test]
    async fn test_upsert_record_unknown_district_fails() {
        let pool = init_db().await;
        let mut connection = pool.acquire().await.unwrap();
        let record = MonthlyRecordUpsertType {
            district_id: 77,
            year: 2024,
            month: 1,
            households_registered: 1,
            households_work_provided: 1,
            total_persondays: 1,
            wages_paid: 1.0,
            women_participation_pct: 1.0,
            works_completed: 1,
            works_ongoing: 1,
            avg_wage: 1.0,
            source_date: "2024-01-31".to_string(),
        };
        assert!(MonthlyRecordDao::new().upsert_record(&mut connection, &record).await.is_err());
    }
}
