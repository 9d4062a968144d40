// ABOUTME: Bounded in-process cache tier: LRU shards behind independent locks.
// ABOUTME: Threads touching different keys rarely contend on the same shard.
use crate::{CacheKey, CacheScope};
use lru::LruCache;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

pub type SharedValue = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
pub struct MemoryEntry {
    pub value: SharedValue,
    pub inserted_at: SystemTime,
    pub ttl: Option<Duration>,
}

impl MemoryEntry {
    pub fn new(value: SharedValue, inserted_at: SystemTime, ttl: Option<Duration>) -> Self {
        Self {
            value,
            inserted_at,
            ttl,
        }
    }

    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        match self.ttl {
            Some(ttl) => now.duration_since(self.inserted_at).unwrap_or(Duration::ZERO) >= ttl,
            None => false,
        }
    }
}

pub struct ShardedLru {
    shards: Vec<Mutex<LruCache<CacheKey, MemoryEntry>>>,
    capacity: usize,
}

impl ShardedLru {
    /// `capacity` is the total across shards and the shard capacities sum to
    /// exactly that. The shard count never exceeds it so each shard holds at
    /// least one entry.
    pub fn new(capacity: usize, shards: usize) -> Self {
        let capacity = capacity.max(1);
        let shard_count = shards.clamp(1, capacity);
        let base = capacity / shard_count;
        let extra = capacity % shard_count;
        let shards = (0..shard_count)
            .map(|i| {
                let size = base + usize::from(i < extra);
                let size = NonZeroUsize::new(size).unwrap_or(NonZeroUsize::MIN);
                Mutex::new(LruCache::new(size))
            })
            .collect();
        Self { shards, capacity }
    }

    fn shard(&self, key: &CacheKey) -> &Mutex<LruCache<CacheKey, MemoryEntry>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.shards.len();
        &self.shards[idx]
    }

    /// Marks the entry most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<MemoryEntry> {
        self.shard(key).lock().get(key).cloned()
    }

    /// Returns the number of entries evicted to make room (0 or 1).
    pub fn put(&self, key: CacheKey, entry: MemoryEntry) -> u64 {
        let mut shard = self.shard(&key).lock();
        match shard.push(key.clone(), entry) {
            Some((old_key, _)) if old_key != key => 1,
            _ => 0,
        }
    }

    pub fn remove(&self, key: &CacheKey) -> bool {
        self.shard(key).lock().pop(key).is_some()
    }

    pub fn remove_scope(&self, scope: &CacheScope) -> u64 {
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = shard.lock();
            let doomed: Vec<CacheKey> = shard
                .iter()
                .filter(|(k, _)| &k.scope == scope)
                .map(|(k, _)| k.clone())
                .collect();
            for key in doomed {
                shard.pop(&key);
                removed += 1;
            }
        }
        removed
    }

    pub fn clear(&self) -> u64 {
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = shard.lock();
            removed += shard.len() as u64;
            shard.clear();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}
