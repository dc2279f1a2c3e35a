use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use prometheus::{IntCounterVec, Opts};
use sqlx::pool::PoolConnection;
use sqlx::{Pool, Sqlite};
use tracing::{error, info, instrument, warn};

use crate::{
    dao::{districts::DistrictDao, fetch_log::FetchLogDao, records::MonthlyRecordDao},
    model::{
        apperror::{ApplicationError, ErrorType},
        config::SeedConfig,
        models::{DistrictDetailType, FetchStatus, MonthlyRecordUpsertType},
        sample::{fallback_district_inputs, fallback_table, generate_sample_records},
    },
    service::{
        districts::DistrictService,
        upstream::{UpstreamClient, UpstreamRecord},
    },
};

/**
 * Source url written to the fetch log when sample records are generated.
 */
const SAMPLE_SOURCE: &str = "sample://fallback";

/**
 * Keeps the stored districts and monthly records up to date.
 */
pub struct DataSyncService {
    connection_pool: Pool<Sqlite>,
    upstream: UpstreamClient,
    seed_config: SeedConfig,
    district_service: Arc<DistrictService>,
    district_dao: DistrictDao,
    record_dao: MonthlyRecordDao,
    fetch_log_dao: FetchLogDao,
    /**
     * Synchronisation outcomes by status.
     */
    sync_runs: IntCounterVec,
}

impl DataSyncService {
    /**
     * Creates a new instance of `DataSyncService`.
     *
     * # Arguments
     * `connection_pool`: Connection pool for database operations.
     * `upstream`: Client of the open data portal.
     * `seed_config`: Sample data configuration.
     * `district_service`: Service whose response cache is invalidated after new data arrives.
     */
    pub fn new(connection_pool: Pool<Sqlite>, upstream: UpstreamClient, seed_config: SeedConfig, district_service: Arc<DistrictService>) -> Result<Self, ApplicationError> {
        let sync_runs = IntCounterVec::new(Opts::new("sync_runs_total", "Data synchronisation runs by outcome"), &["status"])
            .map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to create sync counter: {err}")))?;
        Ok(DataSyncService {
            connection_pool,
            upstream,
            seed_config,
            district_service,
            district_dao: DistrictDao::new(),
            record_dao: MonthlyRecordDao::new(),
            fetch_log_dao: FetchLogDao::new(),
            sync_runs,
        })
    }

    /**
     * Counter of synchronisation outcomes, for registration with the metrics registry.
     */
    pub fn sync_runs(&self) -> IntCounterVec {
        self.sync_runs.clone()
    }

    /**
     * Inserts or updates the districts of the static table.
     *
     * # Returns
     * The number of seeded districts.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn seed_districts(&self) -> Result<usize, ApplicationError> {
        let inputs = fallback_district_inputs();
        let mut transaction = self.connection_pool.begin().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to begin transaction: {err}")))?;
        for input in &inputs {
            self.district_dao.upsert_district(&mut transaction, input).await?;
        }
        transaction.commit().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to commit transaction: {err}")))?;
        info!("Seeded {} districts", inputs.len());
        Ok(inputs.len())
    }

    /**
     * Runs one synchronisation pass: fetch from the portal when configured, then generate sample records if
     * the database still holds none.
     *
     * # Returns
     * The status of the upstream step.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn run_sync(&self) -> Result<FetchStatus, ApplicationError> {
        let source_url = self.upstream.source_url();
        let log_id = {
            let mut connection = self.connection().await?;
            self.fetch_log_dao.start(&mut connection, &source_url).await?
        };
        let (status, records_fetched, error_message) = if self.upstream.is_usable() {
            match self.store_upstream_records().await {
                Ok(stored) => (FetchStatus::Success, stored, None),
                Err(err) => {
                    error!("Synchronisation from {} failed: {}", source_url, err);
                    (FetchStatus::Failed, 0, Some(err.message))
                }
            }
        } else {
            info!("Upstream is not configured, skipping fetch");
            (FetchStatus::Skipped, 0, None)
        };
        {
            let mut connection = self.connection().await?;
            self.fetch_log_dao.finish(&mut connection, log_id, status, records_fetched, error_message.as_deref()).await?;
        }
        self.sync_runs.with_label_values(&[status.as_str()]).inc();
        if status == FetchStatus::Success {
            self.district_service.invalidate_cache();
        }
        self.ensure_sample_records().await?;
        tracing::Span::current().record("result", status.as_str());
        Ok(status)
    }

    /**
     * Spawns the periodic refresh task. The first run happens one interval after the call.
     *
     * # Returns
     * The task handle, or `None` when the interval is 0.
     */
    pub fn spawn_refresh(self: Arc<Self>, interval_secs: u64) -> Option<tokio::task::JoinHandle<()>> {
        if interval_secs == 0 {
            info!("Periodic refresh disabled");
            return None;
        }
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(err) = self.run_sync().await {
                    error!("Periodic synchronisation failed: {}", err);
                }
            }
        }))
    }

    async fn store_upstream_records(&self) -> Result<i64, ApplicationError> {
        let fetched = self.upstream.fetch_all().await?;
        let districts = {
            let mut connection = self.connection().await?;
            self.district_dao.get_all_districts(&mut connection).await?
        };
        let district_ids = district_index(&districts);
        let source_date = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        let records: Vec<MonthlyRecordUpsertType> = fetched
            .iter()
            .filter_map(|record| {
                let district_id = district_ids.get(&district_key(&record.district_name, &record.state_name));
                if district_id.is_none() {
                    warn!("Skipping record of unknown district {} ({})", record.district_name, record.state_name);
                }
                district_id.map(|district_id| to_upsert(*district_id, record, &source_date))
            })
            .collect();
        self.upsert_records(&records).await?;
        info!("Stored {} of {} upstream records", records.len(), fetched.len());
        Ok(i64::try_from(records.len()).unwrap_or(i64::MAX))
    }

    async fn ensure_sample_records(&self) -> Result<(), ApplicationError> {
        let (existing, districts) = {
            let mut connection = self.connection().await?;
            (self.record_dao.count_records(&mut connection).await?, self.district_dao.get_all_districts(&mut connection).await?)
        };
        if existing > 0 {
            return Ok(());
        }
        let records = sample_records(&districts, self.seed_config.sample_months, Utc::now().date_naive());
        if records.is_empty() {
            return Ok(());
        }
        warn!("No monthly records stored, storing {} sample records", records.len());
        self.upsert_records(&records).await?;
        let mut connection = self.connection().await?;
        self.fetch_log_dao.record(&mut connection, SAMPLE_SOURCE, FetchStatus::Fallback, i64::try_from(records.len()).unwrap_or(i64::MAX), None).await?;
        self.sync_runs.with_label_values(&[FetchStatus::Fallback.as_str()]).inc();
        self.district_service.invalidate_cache();
        Ok(())
    }

    async fn upsert_records(&self, records: &[MonthlyRecordUpsertType]) -> Result<(), ApplicationError> {
        let mut transaction = self.connection_pool.begin().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to begin transaction: {err}")))?;
        for record in records {
            if let Err(err) = self.record_dao.upsert_record(&mut transaction, record).await {
                transaction.rollback().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to rollback transaction: {err}")))?;
                return Err(err);
            }
        }
        transaction.commit().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to commit transaction: {err}")))
    }

    async fn connection(&self) -> Result<PoolConnection<Sqlite>, ApplicationError> {
        self.connection_pool.acquire().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to acquire database connection: {err}")))
    }
}

fn district_key(name: &str, state_name: &str) -> (String, String) {
    (name.trim().to_lowercase(), state_name.trim().to_lowercase())
}

fn district_index(districts: &[DistrictDetailType]) -> HashMap<(String, String), i64> {
    districts.iter().map(|district| (district_key(&district.name, &district.state_name), district.id)).collect()
}

fn to_upsert(district_id: i64, record: &UpstreamRecord, source_date: &str) -> MonthlyRecordUpsertType {
    MonthlyRecordUpsertType {
        district_id,
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
        source_date: source_date.to_string(),
    }
}

/**
 * Sample records for every stored district that has a baseline in the static table.
 */
fn sample_records(districts: &[DistrictDetailType], months: u32, end: NaiveDate) -> Vec<MonthlyRecordUpsertType> {
    let district_ids = district_index(districts);
    fallback_table()
        .iter()
        .zip(fallback_district_inputs())
        .filter_map(|(baseline, input)| district_ids.get(&district_key(&input.name, &input.state_name)).map(|district_id| (*district_id, baseline)))
        .flat_map(|(district_id, baseline)| generate_sample_records(district_id, baseline, months, end))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dao::test_support::init_db;
    use crate::model::config::{CacheConfig, UpstreamConfig};
    use crate::model::models::{DataSource, DistrictListInputType, PaginationInput};
    use crate::service::upstream::test_support::{portal_row, serve};
    use serde_json::json;

    async fn sync_service(pool: Pool<Sqlite>, upstream_config: &UpstreamConfig) -> (DataSyncService, Arc<DistrictService>) {
        let district_service = Arc::new(DistrictService::new(pool.clone(), &CacheConfig::default()));
        let service = DataSyncService::new(pool, UpstreamClient::new(upstream_config).unwrap(), SeedConfig { sample_months: 6 }, district_service.clone()).unwrap();
        service.seed_districts().await.unwrap();
        (service, district_service)
    }

    fn enabled_config(base_url: String) -> UpstreamConfig {
        UpstreamConfig {
            enabled: true,
            base_url,
            resource_id: Some("resource".to_string()),
            api_key: Some("key".to_string()),
            page_size: 10,
            max_retries: 1,
            base_delay_ms: 1,
            max_delay_ms: 1,
            timeout_ms: 2_000,
            ..UpstreamConfig::default()
        }
    }

    async fn record_count(pool: &Pool<Sqlite>) -> i64 {
        let mut connection = pool.acquire().await.unwrap();
        MonthlyRecordDao::new().count_records(&mut connection).await.unwrap()
    }

    #[tokio::test]
    async fn test_seed_districts_is_idempotent() {
        let pool = init_db().await;
        let (service, district_service) = sync_service(pool, &UpstreamConfig::default()).await;
        assert_eq!(service.seed_districts().await.unwrap(), 10);
        let list = district_service.get_district_list(DistrictListInputType::default(), PaginationInput::new(None, Some(100))).await.unwrap();
        assert_eq!(list.districts.len(), 10);
        assert_eq!(list.source, DataSource::Database);
    }

    #[tokio::test]
    async fn test_sync_skipped_generates_samples() {
        let pool = init_db().await;
        let (service, district_service) = sync_service(pool.clone(), &UpstreamConfig::default()).await;
        assert_eq!(service.run_sync().await.unwrap(), FetchStatus::Skipped);
        assert_eq!(record_count(&pool).await, 60);
        let logs = district_service.get_fetch_logs(10).await.unwrap();
        let statuses: Vec<&str> = logs.iter().map(|log| log.status.as_str()).collect();
        assert!(statuses.contains(&"skipped"));
        assert!(statuses.contains(&"fallback"));
        assert_eq!(service.sync_runs().with_label_values(&["skipped"]).get(), 1);
        assert_eq!(service.sync_runs().with_label_values(&["fallback"]).get(), 1);

        service.run_sync().await.unwrap();
        assert_eq!(record_count(&pool).await, 60);
        assert_eq!(service.sync_runs().with_label_values(&["fallback"]).get(), 1);
    }

    #[tokio::test]
    async fn test_sync_without_sample_months_logs_no_fallback() {
        let pool = init_db().await;
        let district_service = Arc::new(DistrictService::new(pool.clone(), &CacheConfig::default()));
        let service = DataSyncService::new(pool.clone(), UpstreamClient::new(&UpstreamConfig::default()).unwrap(), SeedConfig { sample_months: 0 }, district_service.clone()).unwrap();
        service.seed_districts().await.unwrap();
        for _ in 0..2 {
            assert_eq!(service.run_sync().await.unwrap(), FetchStatus::Skipped);
        }
        assert_eq!(record_count(&pool).await, 0);
        let logs = district_service.get_fetch_logs(10).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|log| log.status == "skipped"));
        assert_eq!(service.sync_runs().with_label_values(&["fallback"]).get(), 0);
        assert_eq!(service.sync_runs().with_label_values(&["skipped"]).get(), 2);
    }

    #[tokio::test]
    async fn test_sync_unreachable_upstream_still_serves_districts() {
        let pool = init_db().await;
        let (service, district_service) = sync_service(pool.clone(), &enabled_config("http://127.0.0.1:1".to_string())).await;
        assert_eq!(service.run_sync().await.unwrap(), FetchStatus::Failed);
        let logs = district_service.get_fetch_logs(10).await.unwrap();
        let failed = logs.iter().find(|log| log.status == "failed").unwrap();
        assert!(failed.error_message.is_some());
        assert!(failed.finished_at.is_some());
        assert!(record_count(&pool).await > 0);
        let list = district_service.get_district_list(DistrictListInputType::default(), PaginationInput::new(None, None)).await.unwrap();
        assert!(!list.districts.is_empty());
    }

    #[tokio::test]
    async fn test_sync_stores_known_districts() {
        let body = json!({"records": [portal_row("LUCKNOW", "Apr"), portal_row("NOWHERE", "Apr"), portal_row("AGRA", "Jan")]}).to_string();
        let (address, server) = serve(vec![body]).await;
        let pool = init_db().await;
        let (service, district_service) = sync_service(pool.clone(), &enabled_config(address)).await;
        assert_eq!(service.run_sync().await.unwrap(), FetchStatus::Success);
        server.await.unwrap();
        assert_eq!(record_count(&pool).await, 2);
        let logs = district_service.get_fetch_logs(10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, "success");
        assert_eq!(logs[0].records_fetched, 2);
        let agra = district_service.get_record_list(4, PaginationInput::new(None, None)).await.unwrap();
        assert_eq!(agra.records[0].year, 2025);
        assert_eq!(agra.records[0].month, 1);
    }

    #[test]
    fn test_sample_records_only_for_known_districts() {
        let districts = vec![DistrictDetailType::new(7, "Lucknow".to_string(), "09".to_string(), "Uttar Pradesh".to_string(), 26.8, 80.9, "IN-UP".to_string())];
        let records = sample_records(&districts, 3, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|record| record.district_id == 7));
    }
}
