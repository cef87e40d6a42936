//! In-memory cat store using DashMap
//!
//! Bounded by total entry size and expires every entry after a fixed TTL.
//! Reads are lock-free; writes are serialized so size accounting stays exact.

use async_trait::async_trait;
use cats_core::{Cat, CatStore, NewCat, Result, StorageError};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

pub struct CacheStore {
    data: DashMap<String, CacheEntry>,
    state: Mutex<WriteState>,
    sequence: AtomicU64,
    capacity: usize,
    ttl: Duration,
}

struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
    /// Creation order, used for listing.
    created: u64,
    /// Last write, used to pick eviction victims.
    written: u64,
}

/// Bookkeeping shared by all writers. Every change to `data` happens while
/// this is locked, so `by_write` always indexes exactly the stored entries.
#[derive(Default)]
struct WriteState {
    used: usize,
    /// Keys by last write. The TTL is fixed, so this is also expiry order.
    by_write: BTreeMap<u64, String>,
}

impl CacheEntry {
    fn cost(&self, key: &str) -> usize {
        key.len() + self.value.len()
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

enum Lookup {
    Live(Vec<u8>),
    Expired,
    Missing,
}

impl CacheStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            data: DashMap::new(),
            state: Mutex::new(WriteState::default()),
            sequence: AtomicU64::new(0),
            capacity,
            ttl,
        }
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn used_bytes(&self) -> usize {
        self.state.lock().map(|state| state.used).unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn remove_expired(&self) -> Result<usize> {
        let mut state = self.lock_state()?;
        Ok(self.remove_expired_locked(&mut state, Instant::now()))
    }

    /// Periodically clear expired entries until the store is dropped.
    pub fn spawn_sweeper(store: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(store);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;

                let Some(store) = store.upgrade() else {
                    break;
                };
                match store.remove_expired() {
                    Ok(0) => {}
                    Ok(removed) => debug!(
                        "Swept {} expired cache entries, {} left using {}/{} bytes",
                        removed,
                        store.len(),
                        store.used_bytes(),
                        store.capacity()
                    ),
                    Err(e) => tracing::warn!("Cache sweep failed: {}", e),
                }
            }
        })
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, WriteState>> {
        self.state
            .lock()
            .map_err(|_| StorageError::Cache("cache state lock poisoned".to_string()))
    }

    fn lookup(&self, id: &str, now: Instant) -> Lookup {
        match self.data.get(id) {
            Some(entry) if entry.is_expired(now) => Lookup::Expired,
            Some(entry) => Lookup::Live(entry.value.clone()),
            None => Lookup::Missing,
        }
    }

    fn get_live(&self, id: &str) -> Result<Vec<u8>> {
        let now = Instant::now();
        match self.lookup(id, now) {
            Lookup::Live(value) => Ok(value),
            Lookup::Expired => {
                let mut state = self.lock_state()?;
                self.remove_if_expired(id, &mut state, now);
                Err(StorageError::NotFound(id.to_string()))
            }
            Lookup::Missing => Err(StorageError::NotFound(id.to_string())),
        }
    }

    /// Remove `key` from the map and the write index.
    fn remove_entry(&self, key: &str, state: &mut WriteState) -> Option<CacheEntry> {
        let (key, entry) = self.data.remove(key)?;
        state.used -= entry.cost(&key);
        state.by_write.remove(&entry.written);
        Some(entry)
    }

    fn remove_if_expired(&self, key: &str, state: &mut WriteState, now: Instant) -> bool {
        match self.data.remove_if(key, |_, entry| entry.is_expired(now)) {
            Some((key, entry)) => {
                state.used -= entry.cost(&key);
                state.by_write.remove(&entry.written);
                true
            }
            None => false,
        }
    }

    /// Expired entries form a prefix of the write index, so only that
    /// prefix is visited.
    fn remove_expired_locked(&self, state: &mut WriteState, now: Instant) -> usize {
        let mut removed = 0;
        while let Some((_, key)) = state.by_write.first_key_value() {
            let key = key.clone();
            if !self.remove_if_expired(&key, state, now) {
                break;
            }
            removed += 1;
        }
        removed
    }

    /// Evict until `needed` more bytes fit: expired entries first, then the
    /// least recently written.
    fn make_room(&self, state: &mut WriteState, needed: usize, now: Instant) {
        if state.used + needed <= self.capacity {
            return;
        }

        self.remove_expired_locked(state, now);

        while state.used + needed > self.capacity {
            let Some((_, victim)) = state.by_write.pop_first() else {
                break;
            };
            if let Some((key, entry)) = self.data.remove(&victim) {
                state.used -= entry.cost(&key);
                debug!("Evicted cat {} from cache", key);
            }
        }
    }

    /// Write `cat` under `id`. With `must_exist`, a missing or expired entry
    /// is reported as `NotFound` and nothing is written.
    fn write(&self, id: &str, cat: &NewCat, must_exist: bool) -> Result<()> {
        let value = serde_json::to_vec(cat)?;
        let cost = id.len() + value.len();
        if cost > self.capacity {
            return Err(StorageError::Cache(format!(
                "entry of {} bytes exceeds cache capacity of {} bytes",
                cost, self.capacity
            )));
        }

        let mut state = self.lock_state()?;
        let now = Instant::now();

        let created = match self.remove_entry(id, &mut state) {
            Some(old) if old.is_expired(now) => {
                if must_exist {
                    return Err(StorageError::NotFound(id.to_string()));
                }
                self.next_sequence()
            }
            Some(old) => old.created,
            None if must_exist => return Err(StorageError::NotFound(id.to_string())),
            None => self.next_sequence(),
        };

        self.make_room(&mut state, cost, now);

        let written = self.next_sequence();
        self.data.insert(
            id.to_string(),
            CacheEntry {
                value,
                expires_at: now + self.ttl,
                created,
                written,
            },
        );
        state.by_write.insert(written, id.to_string());
        state.used += cost;

        Ok(())
    }
}

#[async_trait]
impl CatStore for CacheStore {
    async fn status(&self) -> Result<()> {
        Ok(())
    }

    async fn insert(&self, cat: &NewCat) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        debug!("Saving cat {} to cache", id);
        self.write(&id, cat, false)?;
        Ok(id)
    }

    async fn select(&self, id: &str) -> Result<Cat> {
        let value = self.get_live(id)?;
        let cat: NewCat = serde_json::from_slice(&value)?;
        Ok(Cat::from_new(id, cat))
    }

    async fn select_all(&self, limit: i64, offset: i64) -> Result<Vec<Cat>> {
        let now = Instant::now();
        let mut live: Vec<(u64, String, Vec<u8>)> = self
            .data
            .iter()
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| (entry.created, entry.key().clone(), entry.value.clone()))
            .collect();
        live.sort_by_key(|(created, _, _)| *created);

        let cats = live
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|(_, id, value)| -> Result<Cat> {
                let cat: NewCat = serde_json::from_slice(&value)?;
                Ok(Cat::from_new(id, cat))
            })
            .collect::<Result<Vec<_>>>()?;

        if cats.is_empty() {
            return Err(StorageError::NotFound(format!(
                "no cats at offset {}",
                offset
            )));
        }
        Ok(cats)
    }

    async fn update(&self, id: &str, cat: &NewCat) -> Result<()> {
        debug!("Updating cat {} in cache", id);
        self.write(id, cat, true)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut state = self.lock_state()?;
        let now = Instant::now();

        match self.remove_entry(id, &mut state) {
            Some(entry) => {
                if entry.is_expired(now) {
                    return Err(StorageError::NotFound(id.to_string()));
                }
                debug!("Deleted cat {} from cache", id);
                Ok(())
            }
            None => Err(StorageError::NotFound(id.to_string())),
        }
    }

    async fn purge(&self, table: &str) -> Result<()> {
        Err(StorageError::Unsupported(format!(
            "purge of {} is not available on the cache backend",
            table
        )))
    }
}
