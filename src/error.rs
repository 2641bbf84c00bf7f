//! Error type for the sheet-report library.
//!
//! Every stage fails the whole request: there is no per-sheet or per-page
//! partial result to carry around, so a single fatal enum is enough.
//!
//! Variants are grouped by the stage that raises them. [`ReportError::kind`]
//! folds them into the four classes the HTTP layer cares about:
//!
//! | Kind | Meaning | HTTP |
//! |------|---------|------|
//! | [`ErrorKind::InvalidInput`] | malformed or absent request fields | 400 |
//! | [`ErrorKind::NotFound`] | sheet, column or file does not exist | 400 |
//! | [`ErrorKind::UnsupportedOperation`] | operation keyword not `sum`/`average` | 400 |
//! | [`ErrorKind::Internal`] | I/O or rendering failure | 500 |

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the sheet-report library.
#[derive(Debug, Error)]
pub enum ReportError {
    // ── Request errors ────────────────────────────────────────────────────
    /// Upload request carried no `file` part.
    #[error("No file part")]
    MissingFilePart,

    /// The `file` part had an empty filename.
    #[error("No selected file")]
    EmptyFilename,

    /// Filename does not end in `.xlsx` or would escape the upload directory.
    #[error("Invalid file format")]
    InvalidFileFormat { filename: String },

    /// Aggregation request without `path` or `sheets`.
    #[error("Invalid data")]
    InvalidData,

    /// Render request body is not a report.
    #[error("Invalid report data")]
    InvalidReport { detail: String },

    /// Chart request without a `sheets` object.
    #[error("No sheets data")]
    MissingSheets,

    /// Upload body exceeded the configured limit.
    #[error("File too large (limit {limit} bytes)")]
    UploadTooLarge { limit: usize },

    // ── Workbook errors ───────────────────────────────────────────────────
    /// The bytes could not be parsed as an `.xlsx` workbook.
    #[error("Invalid workbook '{name}': {detail}")]
    InvalidWorkbook { name: String, detail: String },

    /// Workbook path does not exist.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Sheet name is absent from the workbook.
    #[error("Sheet {sheet} not found")]
    SheetNotFound { sheet: String },

    /// Column name is absent from the sheet's header row.
    #[error("Column {column} not found in sheet {sheet}")]
    ColumnNotFound { sheet: String, column: String },

    /// `average` over a column without a single numeric cell.
    #[error("Column {column} in sheet {sheet} has no numeric values")]
    NoNumericValues { sheet: String, column: String },

    /// The result does not fit in an `f64` and cannot be written as JSON.
    #[error("Column {column} in sheet {sheet} overflows")]
    NonFiniteResult { sheet: String, column: String },

    /// Operation keyword is neither `sum` nor `average`.
    #[error("Invalid operation")]
    InvalidOperation { operation: String },

    // ── Render errors ─────────────────────────────────────────────────────
    /// lopdf failed to encode or write the document.
    #[error("PDF rendering failed: {0}")]
    PdfRender(String),

    /// Chart could not be drawn or PNG-encoded.
    #[error("Chart rendering failed: {0}")]
    ChartRender(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the upload directory or persist an upload.
    #[error("Failed to write upload '{path}': {source}")]
    UploadWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`ReportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    UnsupportedOperation,
    Internal,
}

impl ReportError {
    /// Classify this error for the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReportError::MissingFilePart
            | ReportError::EmptyFilename
            | ReportError::InvalidFileFormat { .. }
            | ReportError::InvalidData
            | ReportError::InvalidReport { .. }
            | ReportError::MissingSheets
            | ReportError::UploadTooLarge { .. }
            | ReportError::InvalidWorkbook { .. }
            | ReportError::NoNumericValues { .. }
            | ReportError::NonFiniteResult { .. } => ErrorKind::InvalidInput,
            ReportError::FileNotFound { .. }
            | ReportError::SheetNotFound { .. }
            | ReportError::ColumnNotFound { .. } => ErrorKind::NotFound,
            ReportError::InvalidOperation { .. } => ErrorKind::UnsupportedOperation,
            ReportError::PdfRender(_)
            | ReportError::ChartRender(_)
            | ReportError::UploadWriteFailed { .. }
            | ReportError::InvalidConfig(_)
            | ReportError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Underlying cause worth showing in debug mode, if the message hides one.
    pub fn detail(&self) -> Option<String> {
        match self {
            ReportError::InvalidFileFormat { filename } => Some(format!("filename: {filename}")),
            ReportError::InvalidReport { detail } => Some(detail.clone()),
            ReportError::InvalidOperation { operation } => Some(format!("operation: {operation}")),
            ReportError::UploadWriteFailed { source, .. } => Some(source.to_string()),
            _ => None,
        }
    }
}
