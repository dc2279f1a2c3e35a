use clap::{Parser, command};
use serde::{Deserialize, Serialize};

/**
 * Command-line arguments for the application.
 */
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct ApplicationArguments {
    /**
     * Path to the configuration file.
     */
    #[arg(short, long)]
    pub config_file: String,
}

/**
 * Represents the configuration for the application.
 */
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /**
     * Logging configuration for the application.
     */
    #[serde(default)]
    pub logging: LoggingConfig,
    /**
     * Server configuration for the application.
     */
    pub server: Server,
    /**
     * Database configuration for the application.
     */
    pub database: Database,
    /**
     * Response cache configuration.
     */
    #[serde(default)]
    pub cache: CacheConfig,
    /**
     * Open data portal configuration.
     */
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /**
     * Sample data generation used when no live data is available.
     */
    #[serde(default)]
    pub seed: SeedConfig,
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /**
     * Whether to log the target of the log message.
     */
    pub target: bool,
    /**
     * Whether to log thread IDs .
     */
    pub thread_ids: bool,
    /**
     * Whether to log thread names.
     */
    pub thread_names: bool,
    /**
     * Whether to log line numbers.
     */
    pub line_number: bool,
    /**
     * Whether to log the log level.
     */
    pub level: bool,
    /**
     * Whether to use ANSI colors in logs.
     */
    pub ansi: bool,
    /**
     * Whether to log the source file.
     */
    pub file: bool,
    /**
     * Additional directives for logging configuration, e.g. `sqlx=warn`.
     */
    pub directives: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { target: true, thread_ids: false, thread_names: false, line_number: false, level: true, ansi: true, file: false, directives: vec![] }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    /**
     * Type of the database.
     */
    pub db_type: DatabaseType,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DatabaseType {
    /**
     * `SQLite` database type. Timeouts are in milliseconds.
     */
    #[serde(rename_all = "camelCase")]
    Sqlite { connection_string: String, max_connections: u32, min_connections: u32, acquire_timeout: u64, acquire_slow_threshold: u64, create_if_missing: bool },
}

/**
 * Response cache configuration.
 */
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    /**
     * Time to live for cached responses in seconds.
     */
    pub ttl_secs: u64,
    /**
     * Maximum number of cached responses per endpoint.
     */
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { ttl_secs: 300, max_capacity: 1_000 }
    }
}

/**
 * Configuration of the open data portal client.
 */
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpstreamConfig {
    /**
     * Whether to fetch from the portal at all.
     */
    pub enabled: bool,
    /**
     * Base url of the portal api, e.g. `https://api.data.gov.in`.
     */
    pub base_url: String,
    /**
     * Resource id of the MGNREGA data set.
     */
    pub resource_id: Option<String>,
    /**
     * Api key for the portal.
     */
    pub api_key: Option<String>,
    /**
     * State name filter sent to the portal.
     */
    pub state_filter: Option<String>,
    /**
     * Number of records requested per page.
     */
    pub page_size: u32,
    /**
     * Maximum number of pages fetched in one synchronisation.
     */
    pub max_pages: u32,
    /**
     * Request timeout in milliseconds.
     */
    pub timeout_ms: u64,
    /**
     * Number of retries for a failing request.
     */
    pub max_retries: u32,
    /**
     * Initial retry delay in milliseconds. Doubled for each retry.
     */
    pub base_delay_ms: u64,
    /**
     * Upper bound for the retry delay in milliseconds.
     */
    pub max_delay_ms: u64,
    /**
     * Interval between synchronisations in seconds. 0 disables the periodic refresh.
     */
    pub refresh_interval_secs: u64,
}

impl UpstreamConfig {
    /**
     * Whether the portal client has everything it needs to run.
     */
    pub fn is_usable(&self) -> bool {
        self.enabled && self.resource_id.as_deref().is_some_and(|id| !id.is_empty()) && self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            enabled: false,
            base_url: "https://api.data.gov.in".to_string(),
            resource_id: None,
            api_key: None,
            state_filter: Some("UTTAR PRADESH".to_string()),
            page_size: 500,
            max_pages: 20,
            timeout_ms: 10_000,
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            refresh_interval_secs: 86_400,
        }
    }
}

/**
 * Sample data generation configuration.
 */
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedConfig {
    /**
     * Number of months of sample records generated per district.
     */
    pub sample_months: u32,
}

impl Default for SeedConfig {
    fn default() -> Self {
        SeedConfig { sample_months: 12 }
    }
}

/**
 * Represents the server configuration for the application.
 */
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    /**
     * Number of worker threads for the server.
     */
    pub workers: usize,
    /**
     * Address to bind to.
     */
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /**
     * HTTP port for the server.
     */
    pub http_port: Option<u16>,
    /**
     * HTTPS configuration for the server.
     */
    pub https_config: Option<HttpsConfig>,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

/**
 * Represents the HTTPS configuration for the server.
 */
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpsConfig {
    /**
     * Port for the HTTPS server.
     */
    pub port: u16,
    /**
     * Path to the certificate file.
     */
    pub certificate_file: String,
    /**
     * Path to the private key file.
     */
    pub private_key_file: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = Config {
            logging: LoggingConfig::default(),
            database: Database {
                db_type: DatabaseType::Sqlite { connection_string: "sqlite://mgnrega.db".to_string(), max_connections: 5, min_connections: 1, acquire_timeout: 3000, acquire_slow_threshold: 500, create_if_missing: true },
            },
            server: Server { workers: 4, bind_address: "0.0.0.0".to_string(), http_port: Some(8080), https_config: None },
            cache: CacheConfig::default(),
            upstream: UpstreamConfig { enabled: true, resource_id: Some("ee03643a".to_string()), api_key: Some("key".to_string()), ..UpstreamConfig::default() },
            seed: SeedConfig { sample_months: 24 },
        };
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config.logging.target, deserialized.logging.target);
        assert_eq!(config.logging.directives, deserialized.logging.directives);
        assert_eq!(config.server.workers, deserialized.server.workers);
        assert_eq!(config.server.http_port, deserialized.server.http_port);
        assert_eq!(deserialized.server.bind_address, "0.0.0.0");
        assert!(deserialized.server.https_config.is_none());
        assert_eq!(deserialized.cache.ttl_secs, 300);
        assert_eq!(deserialized.upstream.resource_id.as_deref(), Some("ee03643a"));
        assert!(deserialized.upstream.is_usable());
        assert_eq!(deserialized.seed.sample_months, 24);
        let DatabaseType::Sqlite { connection_string, max_connections, .. } = deserialized.database.db_type;
        assert_eq!(connection_string, "sqlite://mgnrega.db");
        assert_eq!(max_connections, 5);
    }

    #[test]
    fn test_config_optional_sections_default() {
        let config_str = r#"
            [logging]
            target = true
            threadIds = false
            threadNames = false
            lineNumber = false
            level = true
            ansi = false
            file = false
            directives = ["sqlx=warn"]

            [server]
            workers = 2
            httpPort = 8080

            [database.dbType.sqlite]
            connectionString = "sqlite::memory:"
            maxConnections = 1
            minConnections = 1
            acquireTimeout = 1000
            acquireSlowThreshold = 500
            createIfMissing = true
        "#;
        let config: Config = toml::from_str(config_str).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert!(!config.upstream.enabled);
        assert!(!config.upstream.is_usable());
        assert_eq!(config.seed.sample_months, 12);
        assert_eq!(config.cache.max_capacity, 1_000);
    }

    #[test]
    fn test_config_without_logging_section() {
        let config_str = r#"
            [server]
            workers = 1
            httpPort = 8080

            [database.dbType.sqlite]
            connectionString = "sqlite::memory:"
            maxConnections = 1
            minConnections = 1
            acquireTimeout = 1000
            acquireSlowThreshold = 500
            createIfMissing = true
        "#;
        let config: Config = toml::from_str(config_str).unwrap();
        assert!(config.logging.target);
        assert!(config.logging.level);
        assert!(!config.logging.file);
        assert!(config.logging.directives.is_empty());
    }

    #[test]
    fn test_partial_upstream_section() {
        let upstream: UpstreamConfig = toml::from_str("enabled = true\nresourceId = \"abc\"\napiKey = \"key\"\nmaxRetries = 5").unwrap();
        assert!(upstream.is_usable());
        assert_eq!(upstream.max_retries, 5);
        assert_eq!(upstream.page_size, 500);
        assert_eq!(upstream.base_url, "https://api.data.gov.in");
    }

    #[test]
    fn test_upstream_not_usable_without_key() {
        let upstream = UpstreamConfig { enabled: true, resource_id: Some("abc".to_string()), api_key: Some(String::new()), ..UpstreamConfig::default() };
        assert!(!upstream.is_usable());
    }
}
