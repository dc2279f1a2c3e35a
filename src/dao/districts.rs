use sqlx::SqliteConnection;
use tracing::{Instrument, instrument};

use crate::dao::handle_database_error;
use crate::model::{
    apperror::{ApplicationError, ErrorType},
    models::{DataSource, DistrictAddInputType, DistrictDetailType, DistrictListInputType, DistrictListOutputType, PaginationInput, paginate},
};

/**
 * Database response type for querying districts.
 */
pub type QueryDistrictDbResp = (i64, String, String, String, f64, f64, String);

/**
 * SQL query to retrieve a page of districts, optionally filtered by district or state name. `LIKE` folds case for
 * ASCII letters only.
 */
const QUERY_DISTRICT_LIST: &str = "SELECT id, name, state_code, state_name, latitude, longitude, iso_code FROM district
                                   WHERE (?1 IS NULL OR name LIKE '%' || ?1 || '%' ESCAPE '\\' OR state_name LIKE '%' || ?1 || '%' ESCAPE '\\')
                                   AND (?2 IS NULL OR id > ?2)
                                   ORDER BY id
                                   LIMIT ?3";

/**
 * SQL query to retrieve all districts.
 */
const QUERY_ALL_DISTRICTS: &str = "SELECT id, name, state_code, state_name, latitude, longitude, iso_code FROM district ORDER BY id";

/**
 * SQL query to retrieve one district.
 */
const QUERY_DISTRICT: &str = "SELECT id, name, state_code, state_name, latitude, longitude, iso_code FROM district WHERE id = ?1";

/**
 * SQL query to insert or refresh a district. Districts are unique by name and state.
 */
const UPSERT_DISTRICT: &str = "INSERT INTO district (name, state_code, state_name, latitude, longitude, iso_code) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                               ON CONFLICT (name, state_name) DO UPDATE SET state_code = excluded.state_code, latitude = excluded.latitude, longitude = excluded.longitude, iso_code = excluded.iso_code
                               RETURNING id";

impl From<QueryDistrictDbResp> for DistrictDetailType {
    fn from(row: QueryDistrictDbResp) -> Self {
        DistrictDetailType::new(row.0, row.1, row.2, row.3, row.4, row.5, row.6)
    }
}

/**
 * DAO for district related database operations.
 */
pub struct DistrictDao {}

impl DistrictDao {
    /**
     * Creates a new instance of `DistrictDao`.
     */
    pub fn new() -> Self {
        DistrictDao {}
    }

    /**
     * Retrieves a page of districts ordered by id.
     *
     * # Arguments
     * `connection`: The database connection.
     * `filter`: Optional search filter.
     * `pagination_input`: Cursor and page size.
     *
     * # Returns
     * A Result containing `DistrictListOutputType` or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_district_list(&self, connection: &mut SqliteConnection, filter: &DistrictListInputType, pagination_input: &PaginationInput) -> Result<DistrictListOutputType, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryDistrictDbResp> = sqlx::query_as(QUERY_DISTRICT_LIST)
            .bind(filter.search.as_deref().map(escape_like))
            .bind(pagination_input.cursor)
            .bind(pagination_input.limit + 1)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get district list: {err}")))?;
        let elements: Vec<DistrictDetailType> = results.into_iter().map(DistrictDetailType::from).collect();
        let (districts, pagination) = paginate(elements, pagination_input.limit, |district| district.id);
        Ok(DistrictListOutputType::new(districts, pagination, DataSource::Database))
    }

    /**
     * Retrieves all districts ordered by id.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_all_districts(&self, connection: &mut SqliteConnection) -> Result<Vec<DistrictDetailType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<QueryDistrictDbResp> = sqlx::query_as(QUERY_ALL_DISTRICTS)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get all districts: {err}")))?;
        Ok(results.into_iter().map(DistrictDetailType::from).collect())
    }

    /**
     * Retrieves one district.
     *
     * # Returns
     * A Result containing the district if it exists, or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_district(&self, connection: &mut SqliteConnection, district_id: i64) -> Result<Option<DistrictDetailType>, ApplicationError> {
        let span = tracing::Span::current();
        let result: Option<QueryDistrictDbResp> = sqlx::query_as(QUERY_DISTRICT)
            .bind(district_id)
            .fetch_optional(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get district: {err}")))?;
        Ok(result.map(DistrictDetailType::from))
    }

    /**
     * Inserts a district or refreshes the stored one with the same name and state.
     *
     * # Returns
     * The id of the district.
     */
    #[instrument(skip(self, transaction), fields(result))]
    pub async fn upsert_district(&self, transaction: &mut SqliteConnection, district: &DistrictAddInputType) -> Result<i64, ApplicationError> {
        let span = tracing::Span::current();
        let id: (i64,) = sqlx::query_as(UPSERT_DISTRICT)
            .bind(&district.name)
            .bind(&district.state_code)
            .bind(&district.state_name)
            .bind(district.latitude)
            .bind(district.longitude)
            .bind(&district.iso_code)
            .fetch_one(transaction)
            .instrument(span)
            .await
            .map_err(|err| handle_database_error(err.as_database_error()))?;
        Ok(id.0)
    }
}

/**
 * Escapes the LIKE wildcards of a search term.
 */
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
