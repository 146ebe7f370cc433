//! Document loading: validate a path, then hand its bytes to the parser for
//! its [`FormatKind`].
//!
//! Parsers are blocking and run on the blocking thread pool. Each returns
//! raw text segments tagged with where they came from; chunking happens
//! later.

use askdoc_index::SourceLocator;
use std::path::Path;
use tracing::{debug, instrument};

use crate::types::{AppError, Document, FormatKind, Result};

/// Raw text extracted from one page, row or file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub source: SourceLocator,
}

/// Validate `path` and extract its segments.
pub async fn load(path: impl AsRef<Path>) -> Result<Vec<Segment>> {
    let document = Document::open(path).await?;
    extract(&document).await
}

/// Extract the segments of an already-opened document.
#[instrument(skip(document), fields(path = %document.path.display(), format = %document.format))]
pub async fn extract(document: &Document) -> Result<Vec<Segment>> {
    let name = document.display_name();
    let bytes = document.bytes.clone();
    let format = document.format;

    let segments = tokio::task::spawn_blocking(move || parse(format, &name, &bytes))
        .await
        .map_err(|e| AppError::Extraction {
            path: document.path.clone(),
            reason: if e.is_panic() {
                format!("{} parser panicked", format)
            } else {
                format!("extraction task failed: {}", e)
            },
        })?
        .map_err(|reason| AppError::Extraction {
            path: document.path.clone(),
            reason,
        })?;

    debug!(segments = segments.len(), "Extracted document");
    Ok(segments)
}

fn parse(format: FormatKind, name: &str, bytes: &[u8]) -> std::result::Result<Vec<Segment>, String> {
    match format {
        FormatKind::Pdf => parse_pdf(name, bytes),
        FormatKind::Txt => Ok(parse_txt(name, bytes)),
        FormatKind::Csv => parse_csv(name, bytes),
    }
}

/// One segment per non-blank page, numbered from 1.
fn parse_pdf(name: &str, bytes: &[u8]) -> std::result::Result<Vec<Segment>, String> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| e.to_string())?;

    Ok(pages
        .into_iter()
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| Segment {
            text: page,
            source: SourceLocator::Page {
                source: name.to_string(),
                page: i as u32 + 1,
            },
        })
        .collect())
}

fn parse_txt(name: &str, bytes: &[u8]) -> Vec<Segment> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(&text);
    if text.trim().is_empty() {
        return Vec::new();
    }

    let lines = text.lines().count().max(1) as u32;
    vec![Segment {
        text: text.to_string(),
        source: SourceLocator::Lines {
            source: name.to_string(),
            start: 1,
            end: lines,
        },
    }]
}

/// One segment per record, rendered as `header: value` lines.
fn parse_csv(name: &str, bytes: &[u8]) -> std::result::Result<Vec<Segment>, String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers().map_err(|e| e.to_string())?.clone();
    let mut segments = Vec::new();

    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| format!("row {}: {}", row, e))?;
        let text = record
            .iter()
            .enumerate()
            .map(|(column, value)| {
                let header = headers
                    .get(column)
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("column {}", column + 1));
                format!("{}: {}", header, value.trim())
            })
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            continue;
        }
        segments.push(Segment {
            text,
            source: SourceLocator::Row {
                source: name.to_string(),
                row: row as u64,
            },
        });
    }

    Ok(segments)
}
