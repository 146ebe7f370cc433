use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

// ============= Document Types =============

/// Supported input formats.
///
/// Dispatch on this enum is exhaustive; adding a format means adding a
/// variant and its parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Pdf,
    Txt,
    Csv,
}

impl FormatKind {
    pub const ALL: [FormatKind; 3] = [FormatKind::Pdf, FormatKind::Txt, FormatKind::Csv];

    /// Map a file extension (case-insensitive, without the dot).
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(FormatKind::Pdf),
            "txt" => Some(FormatKind::Txt),
            "csv" => Some(FormatKind::Csv),
            _ => None,
        }
    }

    /// Classify a path, reporting why it cannot be processed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::MissingExtension(path.to_path_buf()))?;

        Self::from_extension(extension).ok_or_else(|| AppError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: extension.to_string(),
        })
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FormatKind::Pdf => "pdf",
            FormatKind::Txt => "txt",
            FormatKind::Csv => "csv",
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// SHA-256 digest of a document's raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// An uploaded file: validated path, format and raw bytes.
///
/// Only the fingerprint and the index derived from it outlive processing.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub format: FormatKind,
    pub bytes: Vec<u8>,
    pub fingerprint: Fingerprint,
}

impl Document {
    /// Validate `path` and read its content.
    ///
    /// Checks run in order: existence, extension presence, extension support.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = PathBuf::from(path.as_ref().to_string_lossy().trim());

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(AppError::NotFound(path)),
        }

        let format = FormatKind::from_path(&path)?;
        let bytes = tokio::fs::read(&path).await?;
        Ok(Self::from_bytes(path, format, bytes))
    }

    /// Build a document from bytes already in memory.
    pub fn from_bytes(path: PathBuf, format: FormatKind, bytes: Vec<u8>) -> Self {
        let fingerprint = Fingerprint::of(&bytes);
        Self {
            path,
            format,
            bytes,
            fingerprint,
        }
    }

    /// File name used in source locators.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

// ============= Conversation Types =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
    pub fingerprint: String,
    pub asked_at: chrono::DateTime<chrono::Utc>,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("File has no extension, rename it with one of pdf, txt, csv: {}", .0.display())]
    MissingExtension(PathBuf),

    #[error("Unsupported file format '{extension}' (expected pdf, txt or csv): {}", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("Failed to extract text from {}: {reason}", path.display())]
    Extraction { path: PathBuf, reason: String },

    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        context: String,
    },

    #[error("Corrupt index at {}: {reason}", path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    #[error("Answer engine error: {0}")]
    AnswerEngine(String),

    #[error("No document has been processed yet, process a file before asking questions")]
    NotInitialized,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Prefix the message with what was being processed (a path,
    /// fingerprint or question). Structured variants keep their fields.
    pub fn with_context(self, context: impl std::fmt::Display) -> Self {
        match self {
            AppError::EmbeddingService(msg) => {
                AppError::EmbeddingService(format!("{}: {}", context, msg))
            }
            AppError::AnswerEngine(msg) => AppError::AnswerEngine(format!("{}: {}", context, msg)),
            AppError::Internal(msg) => AppError::Internal(format!("{}: {}", context, msg)),
            AppError::DimensionMismatch {
                expected, actual, ..
            } => AppError::DimensionMismatch {
                expected,
                actual,
                context: context.to_string(),
            },
            other => other,
        }
    }

    /// Whether a bounded retry could plausibly succeed.
    ///
    /// Only external-service failures qualify; validation and integrity
    /// errors never do.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::EmbeddingService(_) | AppError::AnswerEngine(_)
        )
    }
}

impl From<askdoc_index::Error> for AppError {
    fn from(err: askdoc_index::Error) -> Self {
        use askdoc_index::Error as IndexError;

        match err {
            IndexError::DimensionMismatch { expected, actual } => AppError::DimensionMismatch {
                expected,
                actual,
                context: "vector index".to_string(),
            },
            IndexError::CorruptIndex { path, reason } => AppError::CorruptIndex { path, reason },
            IndexError::InvalidVector(msg) => {
                AppError::EmbeddingService(format!("invalid vector: {}", msg))
            }
            IndexError::Io(e) => AppError::Io(e),
            other => AppError::Internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("pdf", Some(FormatKind::Pdf))]
    #[case("PDF", Some(FormatKind::Pdf))]
    #[case("txt", Some(FormatKind::Txt))]
    #[case("Csv", Some(FormatKind::Csv))]
    #[case("docx", None)]
    #[case("", None)]
    fn test_format_from_extension(#[case] extension: &str, #[case] expected: Option<FormatKind>) {
        assert_eq!(FormatKind::from_extension(extension), expected);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            FormatKind::from_path(Path::new("report.PDF")).unwrap(),
            FormatKind::Pdf
        );
        assert_eq!(
            FormatKind::from_path(Path::new("dir/notes.txt")).unwrap(),
            FormatKind::Txt
        );
        assert!(matches!(
            FormatKind::from_path(Path::new("file.xyz")),
            Err(AppError::UnsupportedFormat { extension, .. }) if extension == "xyz"
        ));
        assert!(matches!(
            FormatKind::from_path(Path::new("noext")),
            Err(AppError::MissingExtension(_))
        ));
    }

    #[test]
    fn test_fingerprint_is_stable_and_content_based() {
        let a = Fingerprint::of(b"hello");
        let b = Fingerprint::of(b"hello");
        let c = Fingerprint::of(b"hello!");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(
            a.to_hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_index_error_mapping() {
        let err: AppError = askdoc_index::Error::DimensionMismatch {
            expected: 3,
            actual: 2,
        }
        .into();
        assert!(matches!(
            err,
            AppError::DimensionMismatch {
                expected: 3,
                actual: 2,
                ..
            }
        ));

        let err: AppError = askdoc_index::Error::CorruptIndex {
            path: PathBuf::from("x.askidx"),
            reason: "bad".into(),
        }
        .into();
        assert!(matches!(err, AppError::CorruptIndex { .. }));
    }

    #[test]
    fn test_with_context() {
        let err = AppError::EmbeddingService("quota exceeded".into()).with_context("report.pdf");
        assert_eq!(
            err.to_string(),
            "Embedding service error: report.pdf: quota exceeded"
        );

        let err = AppError::DimensionMismatch {
            expected: 3,
            actual: 2,
            context: "vector index".into(),
        }
        .with_context("question 'why?'");
        assert!(err.to_string().contains("question 'why?'"));

        assert!(matches!(
            AppError::NotInitialized.with_context("x"),
            AppError::NotInitialized
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(AppError::EmbeddingService("429".into()).is_transient());
        assert!(AppError::AnswerEngine("timeout".into()).is_transient());
        assert!(!AppError::NotInitialized.is_transient());
        assert!(!AppError::NotFound(PathBuf::from("x")).is_transient());
    }
}
