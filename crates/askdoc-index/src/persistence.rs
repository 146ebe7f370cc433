//! On-disk bundle format.
//!
//! A bundle is a single file:
//!
//! ```text
//! ASKIDX\n
//! {"version":1,"dimensions":384,"count":42,...}\n     <- JSON header
//! <postcard-encoded entries>                           <- body
//! ```
//!
//! The header is read and validated before the body is decoded. Writes go to
//! a temporary file in the destination directory which is then renamed over
//! the destination, so readers see either the old bundle or the new one.
//! Concurrent writers to the same destination are not supported.

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::index::{validate_vector, Entry, VectorIndex};
use crate::types::Chunk;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

const MAGIC: &[u8] = b"ASKIDX\n";

/// Current bundle format version.
pub const FORMAT_VERSION: u32 = 1;

/// Bundle header, stored as one JSON line after the magic line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleHeader {
    /// Format version.
    pub version: u32,
    /// Dimension of every stored vector.
    pub dimensions: usize,
    /// Number of entries in the body.
    pub count: usize,
    /// Build-time configuration.
    pub config: IndexConfig,
    /// When the bundle was written.
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    vector: Vec<f32>,
    chunk: Chunk,
}

pub(crate) async fn save(index: &VectorIndex, destination: &Path) -> Result<()> {
    let header = BundleHeader {
        version: FORMAT_VERSION,
        dimensions: index.dimensions(),
        count: index.len(),
        config: index.config().clone(),
        created_at: Utc::now(),
    };
    let bytes = encode(&header, index.entries())?;

    let parent = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await?;

    let file_name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".to_string());
    let temp_path = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    if let Err(e) = write_and_rename(&temp_path, destination, &bytes).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }

    info!(
        path = %destination.display(),
        count = header.count,
        dimensions = header.dimensions,
        "Saved index bundle"
    );
    Ok(())
}

async fn write_and_rename(temp_path: &Path, destination: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = tokio::fs::File::create(temp_path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(temp_path, destination).await?;
    Ok(())
}

fn encode(header: &BundleHeader, entries: &[Entry]) -> Result<Vec<u8>> {
    let stored: Vec<StoredEntry> = entries
        .iter()
        .map(|entry| StoredEntry {
            vector: entry.vector.clone(),
            chunk: entry.chunk.clone(),
        })
        .collect();

    let header_json = serde_json::to_vec(header)
        .map_err(|e| Error::Serialization(format!("Failed to serialize header: {}", e)))?;
    let body = postcard::to_allocvec(&stored)
        .map_err(|e| Error::Serialization(format!("Failed to serialize entries: {}", e)))?;

    let mut bytes = Vec::with_capacity(MAGIC.len() + header_json.len() + 1 + body.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&header_json);
    bytes.push(b'\n');
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Read only the header of a bundle.
pub async fn read_header(source: &Path) -> Result<BundleHeader> {
    let file = tokio::fs::File::open(source).await?;
    let mut reader = BufReader::new(file);

    let mut magic = Vec::new();
    reader.read_until(b'\n', &mut magic).await?;
    if magic != MAGIC {
        return Err(Error::corrupt(source, "missing bundle marker"));
    }

    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line).await?;
    parse_header(source, &line)
}

fn parse_header(source: &Path, line: &[u8]) -> Result<BundleHeader> {
    let header: BundleHeader = serde_json::from_slice(line)
        .map_err(|e| Error::corrupt(source, format!("unreadable header: {}", e)))?;

    if header.version != FORMAT_VERSION {
        return Err(Error::corrupt(
            source,
            format!(
                "unsupported format version {} (expected {})",
                header.version, FORMAT_VERSION
            ),
        ));
    }
    if header.count > 0 && header.dimensions == 0 {
        return Err(Error::corrupt(source, "non-empty bundle with zero dimensions"));
    }
    Ok(header)
}

pub(crate) async fn load(source: &Path) -> Result<VectorIndex> {
    let bytes = tokio::fs::read(source).await?;
    decode(source, &bytes)
}

pub(crate) async fn load_expecting(source: &Path, expected_dimensions: usize) -> Result<VectorIndex> {
    let header = read_header(source).await?;
    if header.count > 0 && header.dimensions != expected_dimensions {
        return Err(Error::DimensionMismatch {
            expected: expected_dimensions,
            actual: header.dimensions,
        });
    }
    load(source).await
}

fn decode(source: &Path, bytes: &[u8]) -> Result<VectorIndex> {
    let rest = bytes
        .strip_prefix(MAGIC)
        .ok_or_else(|| Error::corrupt(source, "missing bundle marker"))?;
    let newline = rest
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| Error::corrupt(source, "truncated header"))?;
    let header = parse_header(source, &rest[..newline])?;
    let body = &rest[newline + 1..];

    let stored: Vec<StoredEntry> = postcard::from_bytes(body)
        .map_err(|e| Error::corrupt(source, format!("unreadable body: {}", e)))?;

    if stored.len() != header.count {
        return Err(Error::corrupt(
            source,
            format!("header declares {} entries, body has {}", header.count, stored.len()),
        ));
    }

    let mut entries = Vec::with_capacity(stored.len());
    for (position, entry) in stored.into_iter().enumerate() {
        validate_vector(&entry.vector, header.dimensions, position)
            .map_err(|e| Error::corrupt(source, e.to_string()))?;
        entries.push(Entry {
            vector: entry.vector,
            chunk: entry.chunk,
        });
    }

    debug!(path = %source.display(), count = entries.len(), "Decoded index bundle");
    Ok(VectorIndex::from_entries(header.dimensions, header.config, entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceLocator;
    use tempfile::TempDir;

    fn sample() -> VectorIndex {
        let chunks = vec![
            Chunk::new(
                "alpha",
                SourceLocator::Page {
                    source: "a.pdf".into(),
                    page: 1,
                },
            ),
            Chunk::new(
                "beta",
                SourceLocator::Page {
                    source: "a.pdf".into(),
                    page: 2,
                },
            ),
        ];
        VectorIndex::build(
            chunks,
            vec![vec![0.25, 0.5, 1.0], vec![1.0, 0.125, 0.0]],
            IndexConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.askidx");

        let index = sample();
        index.save(&path).await.unwrap();

        let loaded = VectorIndex::load(&path).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dimensions(), 3);
        let texts: Vec<_> = loaded.chunks().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_header_is_readable_alone() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.askidx");
        sample().save(&path).await.unwrap();

        let header = read_header(&path).await.unwrap();
        assert_eq!(header.version, FORMAT_VERSION);
        assert_eq!(header.dimensions, 3);
        assert_eq!(header.count, 2);
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.askidx");
        sample().save(&path).await.unwrap();
        sample().save(&path).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["doc.askidx".to_string()]);
    }

    #[tokio::test]
    async fn test_garbage_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.askidx");
        tokio::fs::write(&path, b"not an index").await.unwrap();

        let result = VectorIndex::load(&path).await;
        assert!(matches!(result, Err(Error::CorruptIndex { .. })));
    }

    #[tokio::test]
    async fn test_truncated_body_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.askidx");
        sample().save(&path).await.unwrap();

        let bytes = tokio::fs::read(&path).await.unwrap();
        tokio::fs::write(&path, &bytes[..bytes.len() - 5]).await.unwrap();

        let result = VectorIndex::load(&path).await;
        assert!(matches!(result, Err(Error::CorruptIndex { .. })));
    }

    #[tokio::test]
    async fn test_inconsistent_dimension_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.askidx");

        let header = BundleHeader {
            version: FORMAT_VERSION,
            dimensions: 3,
            count: 1,
            config: IndexConfig::default(),
            created_at: Utc::now(),
        };
        let entries = vec![Entry {
            vector: vec![1.0, 2.0],
            chunk: Chunk::new(
                "short",
                SourceLocator::Row {
                    source: "x.csv".into(),
                    row: 0,
                },
            ),
        }];
        tokio::fs::write(&path, encode(&header, &entries).unwrap())
            .await
            .unwrap();

        let result = VectorIndex::load(&path).await;
        assert!(matches!(result, Err(Error::CorruptIndex { .. })));
    }

    #[tokio::test]
    async fn test_load_expecting_rejects_other_dimension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.askidx");
        sample().save(&path).await.unwrap();

        let result = VectorIndex::load_expecting(&path, 1536).await;
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch {
                expected: 1536,
                actual: 3
            })
        ));
        assert!(VectorIndex::load_expecting(&path, 3).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_version_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.askidx");
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(
            br#"{"version":99,"dimensions":3,"count":0,"config":{},"created_at":"2024-01-01T00:00:00Z"}"#,
        );
        bytes.push(b'\n');
        tokio::fs::write(&path, bytes).await.unwrap();

        let result = VectorIndex::load(&path).await;
        assert!(matches!(result, Err(Error::CorruptIndex { .. })));
    }
}
