//! Shared cache of trained models.
//!
//! Keys are (market, training window, feature schema hash). Each key owns a
//! slot guarded by its own mutex, so concurrent requests for the same key
//! train exactly once while requests for other keys proceed in parallel.
//! Failed trainings leave the slot empty and the next request retries.
//!
//! # Examples
//!
//! ```
//! use power_forecast::cache::{ModelCache, ModelKey};
//! use power_core::types::{DateRange, MarketCode};
//! use chrono::NaiveDate;
//!
//! let window = DateRange::new(
//!     NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2025, 1, 7).unwrap(),
//! )
//! .unwrap();
//! let cache: ModelCache<u32> = ModelCache::new();
//! let key = ModelKey::new(MarketCode::De, window, "abc");
//! let first = cache.get_or_train(&key, || Ok::<_, ()>(7)).unwrap();
//! let second = cache.get_or_train(&key, || Ok::<_, ()>(8)).unwrap();
//! assert_eq!(*first.model, 7);
//! assert_eq!(*second.model, 7);
//! assert_eq!(cache.stats().trainings, 1);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use power_core::types::{DateRange, MarketCode};

/// Identity of a trained model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelKey {
    /// Market
    pub market: MarketCode,
    /// Training window
    pub training_window: DateRange,
    /// Feature schema hash
    pub schema_hash: String,
}

impl ModelKey {
    /// Creates a key.
    pub fn new(market: MarketCode, training_window: DateRange, schema_hash: impl Into<String>) -> Self {
        Self {
            market,
            training_window,
            schema_hash: schema_hash.into(),
        }
    }
}

/// A trained model and the key it was trained under.
#[derive(Debug)]
pub struct ModelHandle<M> {
    /// Cache key
    pub key: ModelKey,
    /// Trained model
    pub model: Arc<M>,
}

impl<M> Clone for ModelHandle<M> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            model: Arc::clone(&self.model),
        }
    }
}

/// Counters exposed by [`ModelCache::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of keys with a trained model
    pub entries: usize,
    /// Training runs started (successful or not)
    pub trainings: usize,
    /// Requests served from an existing model
    pub hits: usize,
}

type Slot<M> = Arc<Mutex<Option<ModelHandle<M>>>>;

/// Single-flight model cache.
pub struct ModelCache<M> {
    slots: Mutex<HashMap<ModelKey, Slot<M>>>,
    trainings: AtomicUsize,
    hits: AtomicUsize,
}

impl<M> Default for ModelCache<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> ModelCache<M> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            trainings: AtomicUsize::new(0),
            hits: AtomicUsize::new(0),
        }
    }

    fn slot(&self, key: &ModelKey) -> Slot<M> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Returns the cached model for `key`, training it with `train` if absent.
    ///
    /// Concurrent callers with the same key block until the first finishes.
    /// An error from `train` is returned to that caller only and nothing is cached.
    pub fn get_or_train<E, F>(&self, key: &ModelKey, train: F) -> Result<ModelHandle<M>, E>
    where
        F: FnOnce() -> Result<M, E>,
    {
        let slot = self.slot(key);
        let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = guard.as_ref() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(handle.clone());
        }
        self.trainings.fetch_add(1, Ordering::Relaxed);
        let model = train()?;
        let handle = ModelHandle {
            key: key.clone(),
            model: Arc::new(model),
        };
        *guard = Some(handle.clone());
        Ok(handle)
    }

    /// Cached model for `key`, if trained.
    pub fn get(&self, key: &ModelKey) -> Option<ModelHandle<M>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let slot = slots.get(key)?;
        let guard = slot.lock().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }

    /// Drops every cached model and resets the counters.
    pub fn clear(&self) {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.trainings.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let entries = slots
            .values()
            .filter(|s| s.lock().map(|g| g.is_some()).unwrap_or(false))
            .count();
        CacheStats {
            entries,
            trainings: self.trainings.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
        }
    }
}
