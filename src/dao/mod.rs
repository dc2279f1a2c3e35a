pub mod districts;
pub mod fetch_log;
pub mod records;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    config::DatabaseType,
};

/**
 * Creates the connection pool and applies the embedded migrations.
 *
 * # Arguments
 * `database_type`: The database configuration.
 *
 * # Returns
 * The migrated pool or an `ApplicationError`.
 */
pub async fn create_pool(database_type: &DatabaseType) -> Result<Pool<Sqlite>, ApplicationError> {
    let DatabaseType::Sqlite { connection_string, max_connections, min_connections, acquire_timeout, acquire_slow_threshold, create_if_missing } = database_type;
    let connect_options = SqliteConnectOptions::from_str(connection_string)
        .map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Invalid database connection string: {err}")))?
        .create_if_missing(*create_if_missing)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(*max_connections)
        .min_connections(*min_connections)
        .acquire_timeout(Duration::from_millis(*acquire_timeout))
        .acquire_slow_threshold(Duration::from_millis(*acquire_slow_threshold))
        .connect_with(connect_options)
        .await
        .map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to create database pool: {err}")))?;
    sqlx::migrate!("./migrations").run(&pool).await.map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to run migrations: {err}")))?;
    Ok(pool)
}

/**
 * Handles database errors of write operations and maps them to application errors.
 *
 * # Arguments
 * `error`: The database error to handle.
 *
 * # Returns
 * An `ApplicationError` corresponding to the database error.
 */
pub fn handle_database_error(error: Option<&dyn sqlx::error::DatabaseError>) -> ApplicationError {
    if let Some(db_error) = error {
        tracing::debug!("Database error: {}", db_error);
        match db_error.code().as_deref() {
            // SQLITE_CONSTRAINT_UNIQUE and SQLITE_CONSTRAINT_PRIMARYKEY
            Some("2067" | "1555") => return ApplicationError::new(ErrorType::Application, "Already exists".to_string()),
            // SQLITE_CONSTRAINT_FOREIGNKEY
            Some("787") => return ApplicationError::new(ErrorType::Application, "Missing parent value".to_string()),
            // SQLITE_CONSTRAINT_CHECK
            Some("275") => return ApplicationError::new(ErrorType::Validation, "Value out of range".to_string()),
            _ => {}
        }
        tracing::error!("Unhandled database error: {}", db_error);
        return ApplicationError::new(ErrorType::DatabaseError, "Unhandled database error".to_string());
    }
    ApplicationError::new(ErrorType::DatabaseError, "Failed to execute database operation".to_string())
}

#[cfg(test)]
pub mod test_support {
    use chrono::NaiveDate;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};

    use crate::dao::{districts::DistrictDao, records::MonthlyRecordDao};
    use crate::model::sample::{fallback_district_inputs, fallback_table, generate_sample_records};

    /**
     * Months of sample records per district in the seeded test database, ending December 2024.
     */
    pub const SEED_MONTHS: u32 = 24;

    /**
     * Creates an empty migrated in-memory database. The pool holds exactly one connection so the
     * in-memory database lives as long as the pool.
     */
    pub async fn init_db() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new().max_connections(1).min_connections(1).idle_timeout(None).max_lifetime(None).connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    /**
     * Creates an in-memory database with the fallback districts and sample records.
     */
    pub async fn init_seeded_db() -> Pool<Sqlite> {
        let pool = init_db().await;
        let district_dao = DistrictDao::new();
        let record_dao = MonthlyRecordDao::new();
        let end = NaiveDate::from_ymd_opt(2024, 12, 15).unwrap();
        let mut transaction = pool.begin().await.unwrap();
        for (input, baseline) in fallback_district_inputs().iter().zip(fallback_table()) {
            let id = district_dao.upsert_district(&mut transaction, input).await.unwrap();
            for record in generate_sample_records(id, baseline, SEED_MONTHS, end) {
                record_dao.upsert_record(&mut transaction, &record).await.unwrap();
            }
        }
        transaction.commit().await.unwrap();
        pool
    }
}
