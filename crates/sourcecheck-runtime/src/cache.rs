//! Report memoisation.
//!
//! Verifying the same record against the same document under the same
//! configuration yields the same report, so finished reports are kept in
//! a `moka` cache. Partial reports (deadline hit) are never stored.

use moka::future::Cache;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use sourcecheck_core::VerificationReport;

use crate::config::ReportCacheConfig;

/// Cache key for a verified record.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReportKey {
    configuration: u64,
    document: u64,
    fields: u64,
}

impl ReportKey {
    /// `configuration` is a fingerprint of everything that shapes the
    /// report besides its inputs (schema, policy, agent set).
    pub fn new(configuration: u64, document: &str, fields: &BTreeMap<String, String>) -> Self {
        Self {
            configuration,
            document: hash_one(document),
            fields: hash_fields(fields),
        }
    }
}

/// Report cache using moka.
pub struct ReportCache {
    cache: Cache<ReportKey, Arc<VerificationReport>>,
}

impl ReportCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    pub fn from_config(config: &ReportCacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl)
    }

    pub async fn get(&self, key: &ReportKey) -> Option<Arc<VerificationReport>> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: ReportKey, report: Arc<VerificationReport>) {
        self.cache.insert(key, report).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for ReportCache {
    fn default() -> Self {
        Self::from_config(&ReportCacheConfig::default())
    }
}

pub(crate) fn hash_one(value: impl Hash) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn hash_fields(fields: &BTreeMap<String, String>) -> u64 {
    let mut hasher = DefaultHasher::new();
    for (name, value) in fields {
        name.hash(&mut hasher);
        value.hash(&mut hasher);
    }
    hasher.finish()
}
