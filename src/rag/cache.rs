//! Document cache for the RAG pipeline
//!
//! Maps a document's content fingerprint to the vector index built from it,
//! so identical content is never extracted, chunked or embedded twice.
//!
//! # Cache Key Strategy
//!
//! A [`CacheKey`] is the SHA-256 of the document bytes plus a short digest of
//! the build profile: chunk size, chunk overlap, embedding provider, model and
//! dimension, and similarity metric. Changing any of these yields a different
//! key, so a stale index is never served after a configuration change.
//!
//! # Concurrency
//!
//! A key being built owns a pending slot holding a [`tokio::sync::OnceCell`].
//! The map lock is only held to find or create the slot; the build itself runs
//! outside it. Concurrent callers for the same key wait on the slot and share
//! one build. Callers for different keys build in parallel.
//!
//! Pending slots live outside the LRU, so eviction never drops a build in
//! progress. A finished index moves into the LRU. When a build fails the cell
//! passes initialization to the next waiter; the slot is dropped only once no
//! caller holds it, so a failed build leaves no entry behind.
//!
//! # Persistence
//!
//! With an index directory configured, every built index is saved to
//! `<index_dir>/<key>.askidx`, and a miss first tries that bundle before
//! building.

use askdoc_index::{IndexConfig, VectorIndex};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::rag::chunker::TextChunker;
use crate::rag::embeddings::EmbeddingService;
use crate::rag::loader;
use crate::types::{AppError, Document, Fingerprint, Result};
use crate::utils::toml_config::AskdocConfig;

/// File extension of persisted index bundles.
pub const BUNDLE_EXTENSION: &str = "askidx";

// ============================================================================
// Cache Types
// ============================================================================

/// Identity of a built index: content plus build profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    fingerprint: Fingerprint,
    profile: String,
}

impl CacheKey {
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.fingerprint, self.profile)
    }
}

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from memory
    pub hits: u64,
    /// Lookups that had to wait for or run a build
    pub misses: u64,
    /// Misses satisfied from a persisted bundle
    pub disk_loads: u64,
    /// Full extract, chunk, embed and build runs
    pub builds: u64,
    /// Indexes currently resident
    pub entry_count: usize,
}

impl CacheStats {
    /// Calculate hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

type Slot = Arc<OnceCell<Arc<VectorIndex>>>;

/// Resident indexes plus the builds still in flight.
struct Slots {
    ready: LruCache<CacheKey, Arc<VectorIndex>>,
    pending: HashMap<CacheKey, Slot>,
}

impl Slots {
    fn new(max_entries: usize) -> Self {
        let ready = match NonZeroUsize::new(max_entries) {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };
        Self {
            ready,
            pending: HashMap::new(),
        }
    }
}

/// Outcome of looking a key up under the map lock.
enum Lookup {
    Ready(Arc<VectorIndex>),
    Pending(Slot),
}

// ============================================================================
// Document Cache
// ============================================================================

/// Process-wide fingerprint to index cache.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct DocumentCache {
    slots: Mutex<Slots>,
    chunker: TextChunker,
    embeddings: EmbeddingService,
    index_config: IndexConfig,
    index_dir: Option<PathBuf>,
    profile: String,
    hits: AtomicU64,
    misses: AtomicU64,
    disk_loads: AtomicU64,
    builds: AtomicU64,
}

impl DocumentCache {
    /// Unbounded, memory-only cache.
    pub fn new(chunker: TextChunker, embeddings: EmbeddingService, index_config: IndexConfig) -> Self {
        let profile = profile_digest(&chunker, &embeddings, &index_config);
        Self {
            slots: Mutex::new(Slots::new(0)),
            chunker,
            embeddings,
            index_config,
            index_dir: None,
            profile,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            disk_loads: AtomicU64::new(0),
            builds: AtomicU64::new(0),
        }
    }

    /// Persist built indexes under `dir` and warm-start from it.
    pub fn with_index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = Some(dir.into());
        self
    }

    /// Keep at most `max_entries` indexes resident, evicting the least
    /// recently used. 0 means unbounded.
    pub fn with_capacity(mut self, max_entries: usize) -> Self {
        self.slots = Mutex::new(Slots::new(max_entries));
        self
    }

    pub fn from_config(config: &AskdocConfig, embeddings: EmbeddingService) -> Result<Self> {
        let chunker = TextChunker::new(config.rag.chunk_size, config.rag.chunk_overlap)?;
        let mut cache = Self::new(chunker, embeddings, config.rag.index_config())
            .with_capacity(config.cache.max_entries);
        if config.storage.persist {
            cache = cache.with_index_dir(&config.storage.index_dir);
        }
        Ok(cache)
    }

    pub fn embeddings(&self) -> &EmbeddingService {
        &self.embeddings
    }

    pub fn chunker(&self) -> &TextChunker {
        &self.chunker
    }

    pub fn key_for(&self, fingerprint: &Fingerprint) -> CacheKey {
        CacheKey {
            fingerprint: *fingerprint,
            profile: self.profile.clone(),
        }
    }

    /// Where the bundle for `key` lives, when persistence is enabled.
    pub fn bundle_path(&self, key: &CacheKey) -> Option<PathBuf> {
        self.index_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.{}", key, BUNDLE_EXTENSION)))
    }

    /// Return the index for `document`, building it on first use.
    ///
    /// Repeated calls for the same content return the same `Arc`.
    #[instrument(skip(self, document), fields(path = %document.path.display(), fingerprint = %document.fingerprint))]
    pub async fn get_or_build(&self, document: &Document) -> Result<Arc<VectorIndex>> {
        let key = self.key_for(&document.fingerprint);
        let slot = match self.lookup(&key) {
            Lookup::Ready(index) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit");
                return Ok(index);
            }
            Lookup::Pending(slot) => slot,
        };
        self.misses.fetch_add(1, Ordering::Relaxed);

        match slot.get_or_try_init(|| self.materialize(document, &key)).await {
            Ok(index) => {
                let index = index.clone();
                self.promote(&key, &slot);
                Ok(index)
            }
            Err(e) => {
                self.release_failed(&key, &slot);
                warn!(error = %e, "Failed to build index");
                Err(e)
            }
        }
    }

    /// Look up an already built index without building.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<VectorIndex>> {
        let key = self.key_for(fingerprint);
        let mut slots = self.slots.lock();
        if let Some(index) = slots.ready.get(&key) {
            return Some(index.clone());
        }
        slots.pending.get(&key).and_then(|slot| slot.get().cloned())
    }

    /// Drop the resident index for `fingerprint`. Builds in progress and
    /// persisted bundles stay.
    pub fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        let key = self.key_for(fingerprint);
        self.slots.lock().ready.pop(&key).is_some()
    }

    /// Drop every resident index. Builds in progress and persisted bundles
    /// stay.
    pub fn clear(&self) {
        self.slots.lock().ready.clear();
    }

    /// Number of resident indexes.
    pub fn len(&self) -> usize {
        self.slots.lock().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            disk_loads: self.disk_loads.load(Ordering::Relaxed),
            builds: self.builds.load(Ordering::Relaxed),
            entry_count: self.len(),
        }
    }

    fn lookup(&self, key: &CacheKey) -> Lookup {
        let mut slots = self.slots.lock();
        if let Some(index) = slots.ready.get(key) {
            return Lookup::Ready(index.clone());
        }
        if let Some(slot) = slots.pending.get(key) {
            return match slot.get() {
                Some(index) => Lookup::Ready(index.clone()),
                None => Lookup::Pending(slot.clone()),
            };
        }
        let slot: Slot = Arc::new(OnceCell::new());
        slots.pending.insert(key.clone(), slot.clone());
        Lookup::Pending(slot)
    }

    /// Move a finished build from pending into the LRU. Waiters sharing the
    /// build all call this; only the first finds the slot still pending.
    fn promote(&self, key: &CacheKey, slot: &Slot) {
        let mut slots = self.slots.lock();
        let registered = slots
            .pending
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot));
        if !registered {
            return;
        }
        if let Some(index) = slot.get() {
            slots.pending.remove(key);
            if let Some((evicted, _)) = slots.ready.push(key.clone(), index.clone()) {
                if &evicted != key {
                    debug!(evicted = %evicted, "Evicted least recently used index");
                }
            }
        }
    }

    /// Drop a failed pending slot once no other caller holds it. A caller
    /// still holding the slot has taken over the build.
    fn release_failed(&self, key: &CacheKey, slot: &Slot) {
        let mut slots = self.slots.lock();
        let abandoned = slots.pending.get(key).is_some_and(|current| {
            Arc::ptr_eq(current, slot) && current.get().is_none() && Arc::strong_count(current) == 2
        });
        if abandoned {
            slots.pending.remove(key);
        }
    }

    async fn materialize(&self, document: &Document, key: &CacheKey) -> Result<Arc<VectorIndex>> {
        if let Some(path) = self.bundle_path(key) {
            if let Some(index) = self.load_bundle(&path).await {
                self.disk_loads.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::new(index));
            }
        }

        let index = self.build(document).await?;

        if let Some(path) = self.bundle_path(key) {
            index
                .save(&path)
                .await
                .map_err(AppError::from)
                .map_err(|e| e.with_context(path.display()))?;
        }
        Ok(Arc::new(index))
    }

    /// Try a persisted bundle. Missing, corrupt or incompatible bundles are
    /// logged and ignored so the caller rebuilds.
    async fn load_bundle(&self, path: &Path) -> Option<VectorIndex> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return None;
        }

        let loaded = match self.embeddings.dimensions() {
            Some(expected) => VectorIndex::load_expecting(path, expected).await,
            None => VectorIndex::load(path).await,
        };

        match loaded {
            Ok(index) => {
                info!(path = %path.display(), entries = index.len(), "Loaded persisted index");
                Some(index)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unusable persisted index");
                None
            }
        }
    }

    async fn build(&self, document: &Document) -> Result<VectorIndex> {
        let started = Instant::now();
        self.builds.fetch_add(1, Ordering::Relaxed);

        let segments = loader::extract(document).await?;
        let chunks = self.chunker.split(&segments);
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();

        let vectors = self
            .embeddings
            .embed_batch(&texts)
            .await
            .map_err(|e| e.with_context(document.path.display()))?;

        let index = VectorIndex::build(chunks, vectors, self.index_config.clone())
            .map_err(AppError::from)
            .map_err(|e| e.with_context(document.path.display()))?;

        info!(
            segments = segments.len(),
            chunks = index.len(),
            dimensions = index.dimensions(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Built index"
        );
        Ok(index)
    }
}

fn profile_digest(
    chunker: &TextChunker,
    embeddings: &EmbeddingService,
    index_config: &IndexConfig,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chunker.chunk_size().to_le_bytes());
    hasher.update(chunker.chunk_overlap().to_le_bytes());
    hasher.update(embeddings.provider_name().as_bytes());
    hasher.update(b"|");
    hasher.update(embeddings.model_id().as_bytes());
    hasher.update(b"|");
    hasher.update(embeddings.dimensions().unwrap_or(0).to_le_bytes());
    hasher.update(index_config.metric.name().as_bytes());
    hex::encode(&hasher.finalize()[..8])
}
