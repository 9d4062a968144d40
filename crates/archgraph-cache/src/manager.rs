use crate::memory::{MemoryEntry, SharedValue, ShardedLru};
use crate::storage::{unix_millis, MemoryStore, PersistentStore, SqliteStore, StoredEntry};
use crate::{CacheError, CacheKey, CacheMetrics, CacheResult, CacheScope, CacheStats, ScopeOrigin};
use archgraph_core::{codec, CacheSettings};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, trace};

/// Two-tier cache keyed by `(scope, content hash)`.
///
/// Lookups hit the sharded LRU first, then the persistent store; persistent
/// hits are decoded once and promoted into memory. One instance is shared by
/// every consumer, content-derived and externally sourced alike; the scope
/// origin decides the TTL rules.
pub struct CacheManager {
    memory: ShardedLru,
    persistent: Arc<dyn PersistentStore>,
    metrics: CacheMetrics,
    external_ttl: Duration,
}

impl CacheManager {
    /// Opens the configured persistent backend: SQLite at
    /// `persistent_path`, otherwise a process-local store.
    pub fn new(settings: &CacheSettings) -> CacheResult<Self> {
        let persistent: Arc<dyn PersistentStore> = match &settings.persistent_path {
            Some(path) => Arc::new(SqliteStore::open(path)?),
            None => Arc::new(MemoryStore::new()),
        };
        Self::with_store(settings, persistent)
    }

    pub fn with_store(
        settings: &CacheSettings,
        persistent: Arc<dyn PersistentStore>,
    ) -> CacheResult<Self> {
        if settings.memory_capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "memory_capacity must be > 0".to_string(),
            ));
        }
        if settings.external_ttl_secs == 0 {
            return Err(CacheError::InvalidConfig(
                "external_ttl_secs must be > 0".to_string(),
            ));
        }
        Ok(Self {
            memory: ShardedLru::new(settings.memory_capacity, settings.shards),
            persistent,
            metrics: CacheMetrics::default(),
            external_ttl: settings.external_ttl(),
        })
    }

    /// Memory tier of `capacity` entries over a process-local store.
    pub fn in_memory(capacity: usize) -> CacheResult<Self> {
        let settings = CacheSettings {
            memory_capacity: capacity,
            ..CacheSettings::default()
        };
        Self::with_store(&settings, Arc::new(MemoryStore::new()))
    }

    /// Value stored under `key`, or `None` when absent, expired, or stored
    /// with a different type.
    pub fn get<V>(&self, key: &CacheKey) -> CacheResult<Option<Arc<V>>>
    where
        V: DeserializeOwned + Send + Sync + 'static,
    {
        let now = SystemTime::now();

        if let Some(entry) = self.memory.get(key) {
            if entry.is_expired_at(now) {
                self.expire(key)?;
                self.metrics.record_miss();
                return Ok(None);
            }
            return match entry.value.downcast::<V>() {
                Ok(value) => {
                    self.metrics.record_memory_hit();
                    trace!("cache memory hit {}", key);
                    Ok(Some(value))
                }
                Err(_) => {
                    self.metrics.record_miss();
                    Ok(None)
                }
            };
        }

        let Some(stored) = self.persistent.load(key)? else {
            self.metrics.record_miss();
            return Ok(None);
        };
        if stored.is_expired_at(unix_millis(now)) {
            self.expire(key)?;
            self.metrics.record_miss();
            return Ok(None);
        }

        let value: V = match codec::decode(&stored.value) {
            Ok(v) => v,
            Err(e) => {
                debug!("Dropping undecodable cache entry {}: {}", key, e);
                self.invalidate(key)?;
                self.metrics.record_miss();
                return Ok(None);
            }
        };
        let value = Arc::new(value);
        let shared: SharedValue = value.clone();
        let evicted = self.memory.put(
            key.clone(),
            MemoryEntry::new(shared, stored.inserted_at_time(), stored.ttl()),
        );
        self.metrics.record_evictions(evicted);
        self.metrics.record_persistent_hit();
        trace!("cache persistent hit {}", key);
        Ok(Some(value))
    }

    /// Stores `value` in both tiers. Local scopes reject a TTL; external
    /// scopes fall back to the configured TTL when none is given. TTLs are
    /// persisted in whole seconds, so a fractional one is rejected.
    pub fn put<V>(&self, key: CacheKey, value: V, ttl: Option<Duration>) -> CacheResult<()>
    where
        V: Serialize + Send + Sync + 'static,
    {
        let ttl = self.effective_ttl(&key.scope, ttl)?;
        let now = SystemTime::now();
        let bytes = codec::encode(&value)?;

        self.persistent
            .store(&key, &StoredEntry::new(bytes, now, ttl))?;
        let evicted = self
            .memory
            .put(key, MemoryEntry::new(Arc::new(value), now, ttl));
        self.metrics.record_evictions(evicted);
        self.metrics.record_put();
        Ok(())
    }

    fn effective_ttl(
        &self,
        scope: &CacheScope,
        ttl: Option<Duration>,
    ) -> CacheResult<Option<Duration>> {
        match (scope.origin(), ttl) {
            (ScopeOrigin::Local, None) => Ok(None),
            (ScopeOrigin::Local, Some(_)) => Err(CacheError::TtlOnLocalScope {
                scope: scope.name().to_string(),
            }),
            (ScopeOrigin::External, Some(ttl)) if ttl.subsec_nanos() != 0 => {
                Err(CacheError::FractionalTtl {
                    scope: scope.name().to_string(),
                    ttl,
                })
            }
            (ScopeOrigin::External, Some(ttl)) => Ok(Some(ttl)),
            (ScopeOrigin::External, None) => Ok(Some(self.external_ttl)),
        }
    }

    fn expire(&self, key: &CacheKey) -> CacheResult<()> {
        self.memory.remove(key);
        self.persistent.remove(key)?;
        self.metrics.record_expirations(1);
        Ok(())
    }

    pub fn invalidate(&self, key: &CacheKey) -> CacheResult<()> {
        let in_memory = self.memory.remove(key);
        let persisted = self.persistent.remove(key)?;
        if in_memory || persisted {
            self.metrics.record_invalidations(1);
        }
        Ok(())
    }

    /// Drops every entry of `scope`, e.g. after a schema bump.
    pub fn invalidate_scope(&self, scope: &CacheScope) -> CacheResult<u64> {
        let memory = self.memory.remove_scope(scope);
        let persisted = self.persistent.remove_scope(scope)?;
        let n = memory.max(persisted);
        self.metrics.record_invalidations(n);
        debug!("Invalidated {} entries in scope {}", n, scope);
        Ok(n)
    }

    pub fn invalidate_all(&self) -> CacheResult<()> {
        let memory = self.memory.clear();
        let persisted = self.persistent.clear()?;
        self.metrics.record_invalidations(memory.max(persisted));
        debug!("Cache cleared");
        Ok(())
    }

    /// Removes TTL-expired rows from the persistent tier.
    pub fn purge_expired(&self) -> CacheResult<u64> {
        let n = self.persistent.purge_expired(unix_millis(SystemTime::now()))?;
        self.metrics.record_expirations(n);
        Ok(n)
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot()
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    pub fn persistent_len(&self) -> CacheResult<usize> {
        self.persistent.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archgraph_core::ContentHash;

    fn local(body: &[u8]) -> CacheKey {
        CacheKey::new(CacheScope::local("facts/v1"), ContentHash::of(body))
    }

    #[test]
    fn local_scope_rejects_ttl() {
        let cache = CacheManager::in_memory(4).unwrap();
        let err = cache
            .put(local(b"a"), 1u32, Some(Duration::from_secs(5)))
            .unwrap_err();
        assert!(matches!(err, CacheError::TtlOnLocalScope { .. }));
    }

    #[test]
    fn external_scope_gets_default_ttl() {
        let cache = CacheManager::in_memory(4).unwrap();
        let key = CacheKey::new(CacheScope::external("licenses"), ContentHash::of(b"serde"));
        cache.put(key.clone(), "MIT".to_string(), None).unwrap();
        let row = cache.persistent.load(&key).unwrap().unwrap();
        assert_eq!(
            row.ttl(),
            Some(Duration::from_secs(CacheSettings::default().external_ttl_secs))
        );
    }

    #[test]
    fn zero_ttl_external_entry_is_expired_on_read() {
        let cache = CacheManager::in_memory(4).unwrap();
        let key = CacheKey::new(CacheScope::external("licenses"), ContentHash::of(b"x"));
        cache.put(key.clone(), 5u64, Some(Duration::ZERO)).unwrap();
        assert!(cache.get::<u64>(&key).unwrap().is_none());
        assert_eq!(cache.stats().expirations, 1);
        assert_eq!(cache.persistent_len().unwrap(), 0);
    }

    #[test]
    fn fractional_ttl_is_rejected_before_storage() {
        let cache = CacheManager::in_memory(4).unwrap();
        let key = CacheKey::new(CacheScope::external("advisories"), ContentHash::of(b"a"));
        for ttl in [Duration::from_millis(500), Duration::from_millis(1_500)] {
            let err = cache.put(key.clone(), 1u32, Some(ttl)).unwrap_err();
            assert!(matches!(err, CacheError::FractionalTtl { .. }));
        }
        assert_eq!(cache.persistent_len().unwrap(), 0);
        assert_eq!(cache.memory_len(), 0);

        cache.put(key.clone(), 1u32, Some(Duration::from_secs(2))).unwrap();
        let row = cache.persistent.load(&key).unwrap().unwrap();
        assert_eq!(row.ttl(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn type_mismatch_is_a_miss() {
        let cache = CacheManager::in_memory(4).unwrap();
        cache.put(local(b"a"), 7u32, None).unwrap();
        assert!(cache.get::<String>(&local(b"a")).unwrap().is_none());
        assert_eq!(*cache.get::<u32>(&local(b"a")).unwrap().unwrap(), 7);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            CacheManager::in_memory(0),
            Err(CacheError::InvalidConfig(_))
        ));
    }
}
