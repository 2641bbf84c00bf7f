//! Ingest: validate an uploaded workbook and store it in the upload directory.
//!
//! The bytes are parsed before anything touches the disk, so a rejected
//! upload never leaves a file behind. The write itself goes to a temp file in
//! the same directory followed by a rename; a reader never sees a half-written
//! workbook. Two uploads with the same name still race and the last rename
//! wins.

use crate::error::ReportError;
use crate::report::IngestSummary;
use calamine::{Reader, Xlsx};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The only accepted upload extension.
pub const WORKBOOK_EXTENSION: &str = ".xlsx";

/// Check the declared filename of an upload.
///
/// Rejects a missing or empty name, anything not ending in `.xlsx`, and any
/// name that is not a single path component.
pub fn validate_filename(name: Option<&str>) -> Result<&str, ReportError> {
    let name = name.ok_or(ReportError::MissingFilePart)?;
    if name.is_empty() {
        return Err(ReportError::EmptyFilename);
    }

    let single_component = Path::new(name).file_name().and_then(|f| f.to_str()) == Some(name)
        && !name.contains(['/', '\\']);
    if !name.ends_with(WORKBOOK_EXTENSION) || !single_component {
        return Err(ReportError::InvalidFileFormat {
            filename: name.to_string(),
        });
    }
    Ok(name)
}

/// Parse `bytes` as an `.xlsx` workbook and return its sheet names.
pub fn sheet_names_from_bytes(name: &str, bytes: &[u8]) -> Result<Vec<String>, ReportError> {
    let workbook = Xlsx::new(Cursor::new(bytes)).map_err(|e| ReportError::InvalidWorkbook {
        name: name.to_string(),
        detail: e.to_string(),
    })?;
    Ok(workbook.sheet_names())
}

/// Atomically write `bytes` to `upload_dir/filename`.
pub fn store_upload(upload_dir: &Path, filename: &str, bytes: &[u8]) -> Result<PathBuf, ReportError> {
    let target = upload_dir.join(filename);
    let write_err = |source: std::io::Error| ReportError::UploadWriteFailed {
        path: target.clone(),
        source,
    };

    std::fs::create_dir_all(upload_dir).map_err(write_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(upload_dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.persist(&target).map_err(|e| write_err(e.error))?;

    debug!("Stored {} bytes at {}", bytes.len(), target.display());
    Ok(target)
}

/// Validate, parse and store one upload.
pub fn ingest(
    upload_dir: &Path,
    filename: Option<&str>,
    bytes: &[u8],
) -> Result<IngestSummary, ReportError> {
    let filename = validate_filename(filename)?;
    let sheet_names = sheet_names_from_bytes(filename, bytes)?;
    let path = store_upload(upload_dir, filename, bytes)?;

    info!(
        "Ingested '{}': {} sheets, {} bytes",
        filename,
        sheet_names.len(),
        bytes.len()
    );

    Ok(IngestSummary {
        filename: filename.to_string(),
        num_sheets: sheet_names.len(),
        sheet_names,
        path,
    })
}

/// Open a stored workbook and summarise it without copying it anywhere.
pub fn inspect(path: &Path) -> Result<IngestSummary, ReportError> {
    if !path.is_file() {
        return Err(ReportError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let name = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let workbook: Xlsx<_> =
        calamine::open_workbook(path).map_err(|e: calamine::XlsxError| {
            ReportError::InvalidWorkbook {
                name: name.clone(),
                detail: e.to_string(),
            }
        })?;
    let sheet_names = workbook.sheet_names();

    Ok(IngestSummary {
        filename: name,
        num_sheets: sheet_names.len(),
        sheet_names,
        path: path.to_path_buf(),
    })
}
