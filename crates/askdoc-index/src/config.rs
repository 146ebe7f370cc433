//! Configuration for building and searching an index.

use crate::distance::DistanceMetric;
use serde::{Deserialize, Serialize};

/// Settings fixed at build time and persisted alongside the vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Metric used to score candidates.
    #[serde(default)]
    pub metric: DistanceMetric,

    /// HNSW graph parameters.
    #[serde(default)]
    pub hnsw: HnswConfig,

    /// Indexes with at most this many entries are scanned exhaustively and
    /// never build an HNSW graph. Larger ones use the graph for candidates.
    #[serde(default = "default_exact_search_threshold")]
    pub exact_search_threshold: usize,
}

fn default_exact_search_threshold() -> usize {
    10_000
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::default(),
            hnsw: HnswConfig::default(),
            exact_search_threshold: default_exact_search_threshold(),
        }
    }
}

impl IndexConfig {
    /// Config using the given metric and default graph parameters.
    pub fn with_metric(metric: DistanceMetric) -> Self {
        Self {
            metric,
            ..Self::default()
        }
    }

    /// Set the exhaustive-scan threshold.
    pub fn with_exact_search_threshold(mut self, threshold: usize) -> Self {
        self.exact_search_threshold = threshold;
        self
    }
}

/// HNSW index configuration.
///
/// These parameters trade recall against build time and memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Maximum number of connections per element per layer. Default: 16.
    pub m: usize,

    /// Size of the dynamic candidate list during construction. Default: 200.
    pub ef_construction: usize,

    /// Size of the dynamic candidate list during search.
    ///
    /// Raised to `k` when a search asks for more results. Default: 100.
    pub ef_search: usize,

    /// Insert vectors with `parallel_insert` instead of one by one.
    pub parallel_construction: bool,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 100,
            parallel_construction: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IndexConfig::default();
        assert_eq!(config.metric, DistanceMetric::Cosine);
        assert_eq!(config.exact_search_threshold, 10_000);
    }

    #[test]
    fn test_partial_config_deserializes() {
        let config: IndexConfig = serde_json::from_str(r#"{"metric":"euclidean"}"#).unwrap();
        assert_eq!(config.metric, DistanceMetric::Euclidean);
        assert_eq!(config.hnsw, HnswConfig::default());
    }
}
