use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{Instrument, instrument};

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    models::{FetchLogType, FetchStatus},
};

/**
 * Database response type for querying the fetch log.
 */
pub type QueryFetchLogDbResp = (i64, String, String, DateTime<Utc>, Option<DateTime<Utc>>, i64, Option<String>);

const INSERT_FETCH_LOG: &str = "INSERT INTO fetch_log (source_url, status, started_at, finished_at, records_fetched, error_message) VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING id";

const FINISH_FETCH_LOG: &str = "UPDATE fetch_log SET status = ?1, finished_at = ?2, records_fetched = ?3, error_message = ?4 WHERE id = ?5";

const QUERY_FETCH_LOG_LIST: &str = "SELECT id, source_url, status, started_at, finished_at, records_fetched, error_message FROM fetch_log ORDER BY id DESC LIMIT ?1";

impl From<QueryFetchLogDbResp> for FetchLogType {
    fn from(row: QueryFetchLogDbResp) -> Self {
        FetchLogType { id: row.0, source_url: row.1, status: row.2, started_at: row.3, finished_at: row.4, records_fetched: row.5, error_message: row.6 }
    }
}

/**
 * DAO for the fetch log. The log is purely observational.
 */
pub struct FetchLogDao {}

impl FetchLogDao {
    pub fn new() -> Self {
        FetchLogDao {}
    }

    /**
     * Records the start of a fetch.
     *
     * # Returns
     * The id of the new log row.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn start(&self, connection: &mut SqliteConnection, source_url: &str) -> Result<i64, ApplicationError> {
        self.insert(connection, source_url, FetchStatus::Running, None, 0, None).await
    }

    /**
     * Records a fetch that started and ended immediately, e.g. a skipped one.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn record(&self, connection: &mut SqliteConnection, source_url: &str, status: FetchStatus, records_fetched: i64, error_message: Option<&str>) -> Result<i64, ApplicationError> {
        self.insert(connection, source_url, status, Some(Utc::now()), records_fetched, error_message).await
    }

    async fn insert(
        &self,
        connection: &mut SqliteConnection,
        source_url: &str,
        status: FetchStatus,
        finished_at: Option<DateTime<Utc>>,
        records_fetched: i64,
        error_message: Option<&str>,
    ) -> Result<i64, ApplicationError> {
        let span = tracing::Span::current();
        let id: (i64,) = sqlx::query_as(INSERT_FETCH_LOG)
            .bind(source_url)
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(finished_at)
            .bind(records_fetched)
            .bind(error_message)
            .fetch_one(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to insert fetch log: {err}")))?;
        Ok(id.0)
    }

    /**
     * Records the outcome of a fetch started with `start`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn finish(&self, connection: &mut SqliteConnection, id: i64, status: FetchStatus, records_fetched: i64, error_message: Option<&str>) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(FINISH_FETCH_LOG)
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(records_fetched)
            .bind(error_message)
            .bind(id)
            .execute(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to update fetch log: {err}")))?;
        if result.rows_affected() == 0 {
            tracing::debug!("Fetch log with id {} not found for update", id);
            return Err(ApplicationError::new(ErrorType::NotFound, "Fetch log not found".to_string()));
        }
        Ok(())
    }

    /**
     * Retrieves the most recent log rows, newest first.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_recent(&self, connection: &mut SqliteConnection, limit: i64) -> Result<Vec<FetchLogType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryFetchLogDbResp> = sqlx::query_as(QUERY_FETCH_LOG_LIST)
            .bind(limit)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get fetch log: {err}")))?;
        Ok(results.into_iter().map(FetchLogType::from).collect())
    }
}
