use std::sync::Arc;

use sqlx::pool::PoolConnection;
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{Instrument, instrument, warn};

use crate::{
    dao::{districts::DistrictDao, fetch_log::FetchLogDao, records::MonthlyRecordDao},
    model::{
        apperror::{ApplicationError, ErrorType},
        config::CacheConfig,
        geo,
        models::{
            CompareInputType, ComparisonOutputType, DataSource, DetectInputType, DetectOutputType, DistrictDetailType, DistrictListInputType, DistrictListOutputType, ExportInputType, FetchLogType,
            MonthlyRecordListOutputType, MonthlyRecordType, PaginationInput, Period, SummaryInputType, SummaryOutputType, paginate,
        },
        sample::fallback_districts,
    },
    service::{
        aggregation::{compare_district, summarize},
        cache::{ResponseCache, cache_key},
        export::{ExportOutputType, render},
    },
};

/**
 * Represents the service answering district and statistics queries.
 *
 * Reads go through the response cache, then the database, then the static fallback table.
 */
pub struct DistrictService {
    /**
     * Connection pool for database operations.
     */
    connection_pool: Pool<Sqlite>,
    district_dao: DistrictDao,
    record_dao: MonthlyRecordDao,
    fetch_log_dao: FetchLogDao,
    district_list_cache: ResponseCache<DistrictListOutputType>,
    summary_cache: ResponseCache<SummaryOutputType>,
    record_list_cache: ResponseCache<MonthlyRecordListOutputType>,
    comparison_cache: ResponseCache<ComparisonOutputType>,
}

impl DistrictService {
    /**
     * Creates a new instance of `DistrictService`.
     *
     * # Arguments
     * `connection_pool`: Connection pool for database operations.
     * `cache_config`: Response cache configuration.
     */
    pub fn new(connection_pool: Pool<Sqlite>, cache_config: &CacheConfig) -> Self {
        DistrictService {
            connection_pool,
            district_dao: DistrictDao::new(),
            record_dao: MonthlyRecordDao::new(),
            fetch_log_dao: FetchLogDao::new(),
            district_list_cache: ResponseCache::new(cache_config),
            summary_cache: ResponseCache::new(cache_config),
            record_list_cache: ResponseCache::new(cache_config),
            comparison_cache: ResponseCache::new(cache_config),
        }
    }

    /**
     * Drops every cached response.
     */
    pub fn invalidate_cache(&self) {
        self.district_list_cache.invalidate_all();
        self.summary_cache.invalidate_all();
        self.record_list_cache.invalidate_all();
        self.comparison_cache.invalidate_all();
    }

    /**
     * Checks that the database answers.
     */
    #[instrument(skip(self))]
    pub async fn ping(&self) -> Result<(), ApplicationError> {
        let mut connection = self.connection().await?;
        sqlx::query("SELECT 1")
            .execute(&mut *connection)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Database did not answer: {err}")))?;
        Ok(())
    }

    /**
     * Retrieves a page of districts.
     *
     * Falls back to the static district table when the database cannot be read or holds no districts.
     *
     * # Arguments
     * `filter`: Optional search filter.
     * `pagination_input`: Cursor and page size.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn get_district_list(&self, filter: DistrictListInputType, pagination_input: PaginationInput) -> Result<Arc<DistrictListOutputType>, ApplicationError> {
        let key = cache_key(
            "districts",
            &[("search", filter.search.clone()), ("cursor", pagination_input.cursor.map(|cursor| cursor.to_string())), ("limit", Some(pagination_input.limit.to_string()))],
        );
        if let Some(cached) = self.district_list_cache.get(&key).await {
            return Ok(cached);
        }
        let span = tracing::Span::current();
        let from_database = async {
            let mut connection = self.connection().await?;
            self.district_dao.get_district_list(&mut connection, &filter, &pagination_input).await
        }
        .instrument(span)
        .await;
        match from_database {
            Ok(output) if !(output.districts.is_empty() && filter.search.is_none() && pagination_input.cursor.is_none()) => {
                let output = Arc::new(output);
                self.district_list_cache.insert(key, output.clone()).await;
                Ok(output)
            }
            Ok(_) => {
                warn!("No districts stored, serving fallback districts");
                Ok(Arc::new(fallback_district_list(&filter, &pagination_input)))
            }
            Err(err) => {
                warn!("Failed to read districts, serving fallback districts: {}", err);
                Ok(Arc::new(fallback_district_list(&filter, &pagination_input)))
            }
        }
    }

    /**
     * Retrieves one district. Served from the static district table when the database cannot be read.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn get_district(&self, district_id: i64) -> Result<DistrictDetailType, ApplicationError> {
        let span = tracing::Span::current();
        let from_database = async {
            let mut connection = self.connection().await?;
            self.find_district(&mut connection, district_id).await
        }
        .instrument(span)
        .await;
        match from_database {
            Err(err) if err.error_type == ErrorType::DatabaseError => {
                warn!("Failed to read district, looking up fallback districts: {}", err);
                fallback_districts()
                    .into_iter()
                    .find(|district| district.id == district_id)
                    .ok_or_else(|| ApplicationError::new(ErrorType::NotFound, format!("District {district_id} not found")))
            }
            result => result,
        }
    }

    /**
     * Finds the district whose centroid is closest to the given coordinates.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn detect_district(&self, input: DetectInputType) -> Result<DetectOutputType, ApplicationError> {
        let span = tracing::Span::current();
        let from_database = async {
            let mut connection = self.connection().await?;
            self.district_dao.get_all_districts(&mut connection).await
        }
        .instrument(span)
        .await;
        let (districts, source) = match from_database {
            Ok(districts) if !districts.is_empty() => (districts, DataSource::Database),
            Ok(_) => (fallback_districts(), DataSource::Fallback),
            Err(err) => {
                warn!("Failed to read districts, detecting among fallback districts: {}", err);
                (fallback_districts(), DataSource::Fallback)
            }
        };
        let Some((district, distance_km)) = geo::nearest(input.latitude, input.longitude, &districts) else {
            return Err(ApplicationError::new(ErrorType::NotFound, "No districts available".to_string()));
        };
        Ok(DetectOutputType { district: district.clone(), distance_km, source })
    }

    /**
     * Summarises the most recent months of a district.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn get_summary(&self, district_id: i64, input: SummaryInputType) -> Result<Arc<SummaryOutputType>, ApplicationError> {
        let key = cache_key("summary", &[("district", Some(district_id.to_string())), ("year", input.year.map(|year| year.to_string())), ("months", Some(input.months.to_string()))]);
        if let Some(cached) = self.summary_cache.get(&key).await {
            return Ok(cached);
        }
        let mut connection = self.connection().await?;
        let district = self.find_district(&mut connection, district_id).await?;
        let records = self.record_dao.get_recent_records(&mut connection, district_id, input.year, input.months).await?;
        let output = Arc::new(summarize(district, &records));
        self.summary_cache.insert(key, output.clone()).await;
        Ok(output)
    }

    /**
     * Retrieves a page of monthly records of a district, newest first.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn get_record_list(&self, district_id: i64, pagination_input: PaginationInput) -> Result<Arc<MonthlyRecordListOutputType>, ApplicationError> {
        let key = cache_key(
            "months",
            &[("district", Some(district_id.to_string())), ("cursor", pagination_input.cursor.map(|cursor| cursor.to_string())), ("limit", Some(pagination_input.limit.to_string()))],
        );
        if let Some(cached) = self.record_list_cache.get(&key).await {
            return Ok(cached);
        }
        let mut connection = self.connection().await?;
        self.find_district(&mut connection, district_id).await?;
        let output = Arc::new(self.record_dao.get_record_list(&mut connection, district_id, &pagination_input).await?);
        self.record_list_cache.insert(key, output.clone()).await;
        Ok(output)
    }

    /**
     * Compares one metric across districts.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn compare(&self, input: CompareInputType) -> Result<Arc<ComparisonOutputType>, ApplicationError> {
        let ids = input.district_ids.iter().map(i64::to_string).collect::<Vec<String>>().join(",");
        let key = cache_key("compare", &[("districts", Some(ids)), ("metric", Some(input.metric.as_str().to_string())), ("period", Some(input.period.label()))]);
        if let Some(cached) = self.comparison_cache.get(&key).await {
            return Ok(cached);
        }
        let mut connection = self.connection().await?;
        let mut districts = Vec::with_capacity(input.district_ids.len());
        for district_id in &input.district_ids {
            let district = self.find_district(&mut connection, *district_id).await?;
            let records = self.get_period_records(&mut connection, *district_id, input.period).await?;
            districts.push(compare_district(&district, input.metric, &records));
        }
        let output = Arc::new(ComparisonOutputType { metric: input.metric, period: input.period, districts });
        self.comparison_cache.insert(key, output.clone()).await;
        Ok(output)
    }

    /**
     * Renders the records of a district as csv or json.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn export(&self, district_id: i64, input: ExportInputType) -> Result<ExportOutputType, ApplicationError> {
        let mut connection = self.connection().await?;
        let district = self.find_district(&mut connection, district_id).await?;
        let records = self.record_dao.get_records_chronological(&mut connection, district_id, input.year).await?;
        render(&district, &records, input.format, input.year)
    }

    /**
     * Retrieves the most recent fetch log rows.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn get_fetch_logs(&self, limit: i64) -> Result<Vec<FetchLogType>, ApplicationError> {
        let mut connection = self.connection().await?;
        self.fetch_log_dao.get_recent(&mut connection, limit).await
    }

    async fn get_period_records(&self, connection: &mut SqliteConnection, district_id: i64, period: Period) -> Result<Vec<MonthlyRecordType>, ApplicationError> {
        match period {
            Period::RecentMonths(months) => self.record_dao.get_recent_records(connection, district_id, None, months).await,
            Period::Year(year) => self.record_dao.get_recent_records(connection, district_id, Some(year), 12).await,
        }
    }

    async fn find_district(&self, connection: &mut SqliteConnection, district_id: i64) -> Result<DistrictDetailType, ApplicationError> {
        self.district_dao
            .get_district(connection, district_id)
            .await?
            .ok_or_else(|| ApplicationError::new(ErrorType::NotFound, format!("District {district_id} not found")))
    }

    async fn connection(&self) -> Result<PoolConnection<Sqlite>, ApplicationError> {
        self.connection_pool.acquire().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to acquire database connection: {err}")))
    }
}

/**
 * Applies search and pagination to the static district table.
 */
fn fallback_district_list(filter: &DistrictListInputType, pagination_input: &PaginationInput) -> DistrictListOutputType {
    let elements: Vec<DistrictDetailType> = fallback_districts()
        .into_iter()
        .filter(|district| filter.matches(district))
        .filter(|district| pagination_input.cursor.is_none_or(|cursor| district.id > cursor))
        .take(usize::try_from(pagination_input.limit + 1).unwrap_or(usize::MAX))
        .collect();
    let (districts, pagination) = paginate(elements, pagination_input.limit, |district| district.id);
    DistrictListOutputType::new(districts, pagination, DataSource::Fallback)
}
