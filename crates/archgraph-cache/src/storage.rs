//! Persistent cache tier.
//!
//! Layout shared by every backend: `(scope, content_hash) -> {value,
//! inserted_at, ttl_seconds?}`. `inserted_at` is unix milliseconds; entries
//! with no TTL stay until explicitly invalidated. TTLs are whole seconds; the
//! cache manager rejects anything finer before it reaches a backend.

use crate::{CacheError, CacheKey, CacheResult, CacheScope};
use dashmap::DashMap;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub value: Vec<u8>,
    pub inserted_at: i64,
    pub ttl_seconds: Option<u64>,
}

impl StoredEntry {
    pub fn new(value: Vec<u8>, inserted_at: SystemTime, ttl: Option<Duration>) -> Self {
        Self {
            value,
            inserted_at: unix_millis(inserted_at),
            ttl_seconds: ttl.map(|d| d.as_secs()),
        }
    }

    pub fn inserted_at_time(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_millis(self.inserted_at.max(0) as u64)
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_seconds.map(Duration::from_secs)
    }

    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        match self.ttl_seconds {
            Some(ttl) => {
                let ttl_ms = i64::try_from(ttl.saturating_mul(1000)).unwrap_or(i64::MAX);
                now_millis.saturating_sub(self.inserted_at) >= ttl_ms
            }
            None => false,
        }
    }
}

pub fn unix_millis(t: SystemTime) -> i64 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Backend of the persistent tier. Implementations accept concurrent
/// readers; writes may be serialized internally.
pub trait PersistentStore: Send + Sync {
    fn load(&self, key: &CacheKey) -> CacheResult<Option<StoredEntry>>;
    fn store(&self, key: &CacheKey, entry: &StoredEntry) -> CacheResult<()>;
    fn remove(&self, key: &CacheKey) -> CacheResult<bool>;
    fn remove_scope(&self, scope: &CacheScope) -> CacheResult<u64>;
    fn clear(&self) -> CacheResult<u64>;
    /// Drops every entry whose TTL has elapsed at `now_millis`.
    fn purge_expired(&self, now_millis: i64) -> CacheResult<u64>;
    fn len(&self) -> CacheResult<usize>;
}

/// Process-local backend, used when no database path is configured.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<(String, String), StoredEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn row_key(key: &CacheKey) -> (String, String) {
        (key.scope.storage_name(), key.hash.as_str().to_string())
    }
}

impl PersistentStore for MemoryStore {
    fn load(&self, key: &CacheKey) -> CacheResult<Option<StoredEntry>> {
        Ok(self.entries.get(&Self::row_key(key)).map(|e| e.value().clone()))
    }

    fn store(&self, key: &CacheKey, entry: &StoredEntry) -> CacheResult<()> {
        self.entries.insert(Self::row_key(key), entry.clone());
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> CacheResult<bool> {
        Ok(self.entries.remove(&Self::row_key(key)).is_some())
    }

    fn remove_scope(&self, scope: &CacheScope) -> CacheResult<u64> {
        let name = scope.storage_name();
        let before = self.entries.len();
        self.entries.retain(|(s, _), _| s != &name);
        Ok((before - self.entries.len()) as u64)
    }

    fn clear(&self) -> CacheResult<u64> {
        let n = self.entries.len() as u64;
        self.entries.clear();
        Ok(n)
    }

    fn purge_expired(&self, now_millis: i64) -> CacheResult<u64> {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired_at(now_millis));
        Ok((before - self.entries.len()) as u64)
    }

    fn len(&self) -> CacheResult<usize> {
        Ok(self.entries.len())
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cache_entries (
    scope        TEXT    NOT NULL,
    content_hash TEXT    NOT NULL,
    value        BLOB    NOT NULL,
    inserted_at  INTEGER NOT NULL,
    ttl_seconds  INTEGER,
    PRIMARY KEY (scope, content_hash)
);
CREATE INDEX IF NOT EXISTS idx_cache_entries_expiry
    ON cache_entries (inserted_at) WHERE ttl_seconds IS NOT NULL;
";

const READ_POOL_SIZE: usize = 4;

/// SQLite backend: one serialized writer, a small round-robin reader pool.
pub struct SqliteStore {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    next_reader: AtomicUsize,
    path: Option<PathBuf>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> CacheResult<Self> {
        let writer = Connection::open(path)?;
        writer.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA temp_store = MEMORY;
            ",
        )?;
        writer.execute_batch(SCHEMA)?;

        let mut readers = Vec::with_capacity(READ_POOL_SIZE);
        for _ in 0..READ_POOL_SIZE {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.execute_batch("PRAGMA query_only = ON; PRAGMA busy_timeout = 5000;")?;
            readers.push(Mutex::new(conn));
        }

        info!("Opened persistent cache at {}", path.display());
        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            next_reader: AtomicUsize::new(0),
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database; reads go through the writer connection
    /// because separate in-memory connections do not share data.
    pub fn open_in_memory() -> CacheResult<Self> {
        let writer = Connection::open_in_memory()?;
        writer.execute_batch(SCHEMA)?;
        Ok(Self {
            writer: Mutex::new(writer),
            readers: Vec::new(),
            next_reader: AtomicUsize::new(0),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn with_reader<T>(&self, f: impl FnOnce(&Connection) -> CacheResult<T>) -> CacheResult<T> {
        if self.readers.is_empty() {
            return f(&self.writer.lock());
        }
        let idx = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        f(&self.readers[idx].lock())
    }

    fn with_writer<T>(&self, f: impl FnOnce(&Connection) -> CacheResult<T>) -> CacheResult<T> {
        f(&self.writer.lock())
    }
}

fn ttl_to_sql(ttl: Option<u64>) -> CacheResult<Option<i64>> {
    ttl.map(|t| {
        i64::try_from(t).map_err(|_| CacheError::InvalidConfig(format!("ttl too large: {t}s")))
    })
    .transpose()
}

impl PersistentStore for SqliteStore {
    fn load(&self, key: &CacheKey) -> CacheResult<Option<StoredEntry>> {
        let scope = key.scope.storage_name();
        self.with_reader(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT value, inserted_at, ttl_seconds FROM cache_entries
                 WHERE scope = ?1 AND content_hash = ?2",
            )?;
            let row = stmt
                .query_row(params![scope, key.hash.as_str()], |row| {
                    let ttl: Option<i64> = row.get(2)?;
                    Ok(StoredEntry {
                        value: row.get(0)?,
                        inserted_at: row.get(1)?,
                        ttl_seconds: ttl.map(|t| t.max(0) as u64),
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    fn store(&self, key: &CacheKey, entry: &StoredEntry) -> CacheResult<()> {
        let scope = key.scope.storage_name();
        let ttl = ttl_to_sql(entry.ttl_seconds)?;
        self.with_writer(|conn| {
            let mut stmt = conn.prepare_cached(
                "INSERT INTO cache_entries (scope, content_hash, value, inserted_at, ttl_seconds)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (scope, content_hash) DO UPDATE SET
                    value = excluded.value,
                    inserted_at = excluded.inserted_at,
                    ttl_seconds = excluded.ttl_seconds",
            )?;
            stmt.execute(params![
                scope,
                key.hash.as_str(),
                entry.value,
                entry.inserted_at,
                ttl
            ])?;
            Ok(())
        })
    }

    fn remove(&self, key: &CacheKey) -> CacheResult<bool> {
        let scope = key.scope.storage_name();
        self.with_writer(|conn| {
            let n = conn.execute(
                "DELETE FROM cache_entries WHERE scope = ?1 AND content_hash = ?2",
                params![scope, key.hash.as_str()],
            )?;
            Ok(n > 0)
        })
    }

    fn remove_scope(&self, scope: &CacheScope) -> CacheResult<u64> {
        let scope = scope.storage_name();
        self.with_writer(|conn| {
            let n = conn.execute("DELETE FROM cache_entries WHERE scope = ?1", params![scope])?;
            Ok(n as u64)
        })
    }

    fn clear(&self) -> CacheResult<u64> {
        self.with_writer(|conn| {
            let n = conn.execute("DELETE FROM cache_entries", [])?;
            Ok(n as u64)
        })
    }

    fn purge_expired(&self, now_millis: i64) -> CacheResult<u64> {
        self.with_writer(|conn| {
            let n = conn.execute(
                "DELETE FROM cache_entries
                 WHERE ttl_seconds IS NOT NULL AND ?1 - inserted_at >= ttl_seconds * 1000",
                params![now_millis],
            )?;
            if n > 0 {
                debug!("Purged {} expired cache entries", n);
            }
            Ok(n as u64)
        })
    }

    fn len(&self) -> CacheResult<usize> {
        self.with_reader(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))?;
            Ok(n.max(0) as usize)
        })
    }
}
