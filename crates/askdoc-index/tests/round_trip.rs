//! Save/load round trips must preserve retrieval results exactly.

use askdoc_index::{Chunk, IndexConfig, SourceLocator, VectorIndex};
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

fn random_index(count: usize, dims: usize, seed: u64) -> (VectorIndex, Vec<f32>) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let chunks: Vec<Chunk> = (0..count)
        .map(|i| {
            Chunk::new(
                format!("chunk number {i}"),
                SourceLocator::Lines {
                    source: "doc.txt".to_string(),
                    start: i as u32 + 1,
                    end: i as u32 + 2,
                },
            )
        })
        .collect();
    let vectors: Vec<Vec<f32>> = (0..count)
        .map(|_| (0..dims).map(|_| rng.random_range(-1.0..1.0)).collect())
        .collect();
    let query: Vec<f32> = (0..dims).map(|_| rng.random_range(-1.0..1.0)).collect();

    (
        VectorIndex::build(chunks, vectors, IndexConfig::default()).unwrap(),
        query,
    )
}

#[tokio::test]
async fn search_results_survive_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("doc.askidx");

    let (index, query) = random_index(25, 16, 7);
    index.save(&path).await.unwrap();
    let loaded = VectorIndex::load(&path).await.unwrap();

    for k in [1, 25, 40] {
        let before = index.search(&query, k).unwrap();
        let after = loaded.search(&query, k).unwrap();

        assert_eq!(before.len(), k.min(25));
        assert_eq!(before, after, "results differ for k = {k}");
    }
}

#[tokio::test]
async fn overwrite_replaces_previous_bundle() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("doc.askidx");

    let (first, _) = random_index(3, 4, 1);
    let (second, _) = random_index(9, 4, 2);
    first.save(&path).await.unwrap();
    second.save(&path).await.unwrap();

    let loaded = VectorIndex::load(&path).await.unwrap();
    assert_eq!(loaded.len(), 9);
}

#[tokio::test]
async fn empty_index_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("empty.askidx");

    let index = VectorIndex::build(vec![], vec![], IndexConfig::default()).unwrap();
    index.save(&path).await.unwrap();

    let loaded = VectorIndex::load_expecting(&path, 1536).await.unwrap();
    assert!(loaded.is_empty());
    assert!(loaded.search(&[0.0; 1536], 4).unwrap().is_empty());
}
