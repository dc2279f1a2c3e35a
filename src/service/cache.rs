use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::model::config::CacheConfig;

/**
 * TTL cache of service responses keyed by endpoint and normalised query parameters.
 */
#[derive(Clone)]
pub struct ResponseCache<V: Send + Sync + 'static> {
    inner: Cache<String, Arc<V>>,
}

impl<V: Send + Sync + 'static> ResponseCache<V> {
    /**
     * Creates a new cache from the cache configuration.
     */
    pub fn new(config: &CacheConfig) -> Self {
        let inner = Cache::builder().max_capacity(config.max_capacity).time_to_live(Duration::from_secs(config.ttl_secs)).build();
        ResponseCache { inner }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<V>> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: String, value: Arc<V>) {
        self.inner.insert(key, value).await;
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}

/**
 * Builds a cache key from an endpoint name and its parameters. Missing parameters are written as empty values
 * so that `?cursor=` and no cursor map to the same key.
 *
 * # Example
 * `cache_key("districts", &[("search", Some("luck".to_string())), ("cursor", None)])` gives `districts:search=luck:cursor=`.
 */
pub fn cache_key(endpoint: &str, params: &[(&str, Option<String>)]) -> String {
    let mut key = endpoint.to_string();
    for (name, value) in params {
        key.push(':');
        key.push_str(name);
        key.push('=');
        if let Some(value) = value {
            key.push_str(&value.to_lowercase());
        }
    }
    key
}
