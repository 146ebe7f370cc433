//! The vector index: chunks paired with their embeddings.
//!
//! Small indexes are scanned exhaustively. Above
//! [`IndexConfig::exact_search_threshold`] entries an HNSW graph from
//! `hnsw_rs` supplies candidates, which are then re-scored exactly so that
//! ranking and tie-breaking behave the same on both paths.

use crate::config::{HnswConfig, IndexConfig};
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::persistence;
use crate::types::{Chunk, SearchHit};
use anndists::dist::distances::{DistCosine, DistL2};
use hnsw_rs::hnsw::Hnsw;
use std::fmt;
use std::path::Path;
use tracing::{debug, instrument};

const MAX_LAYER: usize = 16;

/// An immutable collection of (vector, chunk) entries.
///
/// Every vector has the same dimension and every entry keeps the chunk it was
/// built from, source locator included. Indexes are never appended to; a new
/// document produces a new index.
pub struct VectorIndex {
    dimensions: usize,
    config: IndexConfig,
    entries: Vec<Entry>,
    graph: Option<AnnGraph>,
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) vector: Vec<f32>,
    pub(crate) chunk: Chunk,
}

/// HNSW graph keyed by entry position.
enum AnnGraph {
    Cosine(Hnsw<'static, f32, DistCosine>),
    Euclidean(Hnsw<'static, f32, DistL2>),
}

impl AnnGraph {
    fn build(metric: DistanceMetric, config: &HnswConfig, entries: &[Entry]) -> Self {
        let max_elements = entries.len().max(1);
        let refs: Vec<(&Vec<f32>, usize)> = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (&entry.vector, position))
            .collect();

        match metric {
            DistanceMetric::Cosine => {
                let hnsw = Hnsw::new(
                    config.m,
                    max_elements,
                    MAX_LAYER,
                    config.ef_construction,
                    DistCosine {},
                );
                insert_all(&hnsw, &refs, config.parallel_construction);
                AnnGraph::Cosine(hnsw)
            }
            DistanceMetric::Euclidean => {
                let hnsw = Hnsw::new(
                    config.m,
                    max_elements,
                    MAX_LAYER,
                    config.ef_construction,
                    DistL2 {},
                );
                insert_all(&hnsw, &refs, config.parallel_construction);
                AnnGraph::Euclidean(hnsw)
            }
        }
    }

    fn candidates(&self, query: &[f32], k: usize, ef_search: usize) -> Vec<usize> {
        let ef = ef_search.max(k);
        let neighbours = match self {
            AnnGraph::Cosine(hnsw) => hnsw.search(query, k, ef),
            AnnGraph::Euclidean(hnsw) => hnsw.search(query, k, ef),
        };
        neighbours.into_iter().map(|n| n.d_id).collect()
    }
}

fn insert_all<D>(hnsw: &Hnsw<'static, f32, D>, refs: &[(&Vec<f32>, usize)], parallel: bool)
where
    D: anndists::dist::Distance<f32> + Send + Sync,
{
    if parallel {
        hnsw.parallel_insert(refs);
    } else {
        for (vector, position) in refs {
            hnsw.insert((vector.as_slice(), *position));
        }
    }
}

impl VectorIndex {
    /// Pair each chunk with its vector by position.
    ///
    /// The first vector fixes the index dimension.
    ///
    /// # Errors
    ///
    /// - [`Error::LengthMismatch`] if the two sequences differ in length.
    /// - [`Error::DimensionMismatch`] if any vector's dimension differs from
    ///   the first.
    /// - [`Error::InvalidVector`] for empty vectors or NaN/Inf components.
    #[instrument(skip_all, fields(chunks = chunks.len(), metric = %config.metric))]
    pub fn build(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>, config: IndexConfig) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(Error::LengthMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }

        let dimensions = vectors.first().map(Vec::len).unwrap_or(0);
        for (position, vector) in vectors.iter().enumerate() {
            validate_vector(vector, dimensions, position)?;
        }

        let entries: Vec<Entry> = vectors
            .into_iter()
            .zip(chunks)
            .map(|(vector, chunk)| Entry { vector, chunk })
            .collect();

        let index = Self::from_entries(dimensions, config, entries);
        debug!(
            dimensions,
            graph = index.graph.is_some(),
            "Built vector index"
        );
        Ok(index)
    }

    /// Assemble an index from already validated entries.
    pub(crate) fn from_entries(dimensions: usize, config: IndexConfig, entries: Vec<Entry>) -> Self {
        let graph = (entries.len() > config.exact_search_threshold)
            .then(|| AnnGraph::build(config.metric, &config.hnsw, &entries));

        Self {
            dimensions,
            config,
            entries,
            graph,
        }
    }

    /// Vector dimension (0 for an empty index).
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// The metric used for scoring.
    pub fn metric(&self) -> DistanceMetric {
        self.config.metric
    }

    /// Build-time configuration.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether searches go through the HNSW graph.
    pub fn uses_graph(&self) -> bool {
        self.graph.is_some()
    }

    /// Chunks in insertion order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|entry| &entry.chunk)
    }

    pub(crate) fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Return up to `k` chunks most similar to `query`.
    ///
    /// Results are sorted by descending score; equal scores keep insertion
    /// order. Exactly `min(k, len)` results are returned on the exhaustive
    /// path. An empty index returns no results for any query.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }
        if query.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidVector(
                "Query contains NaN or Inf".to_string(),
            ));
        }

        let mut candidates = match &self.graph {
            Some(graph) => graph.candidates(query, k, self.config.hnsw.ef_search),
            None => (0..self.entries.len()).collect(),
        };
        candidates.sort_unstable();
        candidates.dedup();

        let metric = self.config.metric;
        let mut scored: Vec<(usize, f32)> = candidates
            .into_iter()
            .filter_map(|position| {
                let entry = self.entries.get(position)?;
                Some((position, metric.similarity(query, &entry.vector)))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| SearchHit {
                chunk: self.entries[position].chunk.clone(),
                score,
                position,
            })
            .collect())
    }

    /// Persist the index to `destination`, replacing any previous bundle
    /// atomically.
    pub async fn save(&self, destination: impl AsRef<Path>) -> Result<()> {
        persistence::save(self, destination.as_ref()).await
    }

    /// Restore an index persisted with [`VectorIndex::save`].
    pub async fn load(source: impl AsRef<Path>) -> Result<Self> {
        persistence::load(source.as_ref()).await
    }

    /// Restore an index, rejecting it if its dimension differs from
    /// `expected_dimensions`. Empty bundles are accepted for any dimension.
    pub async fn load_expecting(
        source: impl AsRef<Path>,
        expected_dimensions: usize,
    ) -> Result<Self> {
        persistence::load_expecting(source.as_ref(), expected_dimensions).await
    }
}

impl fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimensions", &self.dimensions)
            .field("metric", &self.config.metric)
            .field("len", &self.entries.len())
            .field("graph", &self.graph.is_some())
            .finish()
    }
}

pub(crate) fn validate_vector(vector: &[f32], dimensions: usize, position: usize) -> Result<()> {
    if vector.is_empty() {
        return Err(Error::InvalidVector(format!(
            "Vector at position {} is empty",
            position
        )));
    }
    if vector.len() != dimensions {
        return Err(Error::DimensionMismatch {
            expected: dimensions,
            actual: vector.len(),
        });
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidVector(format!(
            "Vector at position {} contains NaN or Inf",
            position
        )));
    }
    Ok(())
}
