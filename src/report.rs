//! Request and result types shared by the pipeline stages.
//!
//! [`Report`] is the pivot of the whole crate: aggregation produces it and
//! every renderer consumes it. It keeps insertion order for both sheets and
//! columns because that order is the rendering order.

use crate::error::ReportError;
use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ── Ingest ───────────────────────────────────────────────────────────────

/// Result of storing an uploaded workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Original filename, also the key in the upload directory.
    pub filename: String,
    /// Number of sheets in the workbook.
    pub num_sheets: usize,
    /// Sheet names in workbook order.
    #[serde(skip)]
    pub sheet_names: Vec<String>,
    /// Where the workbook was stored.
    #[serde(skip)]
    pub path: PathBuf,
}

// ── Aggregate ────────────────────────────────────────────────────────────

/// Aggregate function applied to every requested column of a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Sum,
    Average,
}

impl FromStr for Operation {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(Operation::Sum),
            "average" => Ok(Operation::Average),
            other => Err(ReportError::InvalidOperation {
                operation: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Sum => f.write_str("sum"),
            Operation::Average => f.write_str("average"),
        }
    }
}

/// One aggregation instruction: which sheet, which function, which columns.
///
/// `operation` stays a raw string so an unknown keyword is reported as
/// "Invalid operation" at the point it is reached, not as a malformed body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetInstruction {
    pub sheet: String,
    pub operation: String,
    pub columns: Vec<String>,
}

impl SheetInstruction {
    pub fn new(
        sheet: impl Into<String>,
        operation: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            sheet: sheet.into(),
            operation: operation.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

/// Body of an aggregation request as it arrives over the wire.
///
/// Both fields are optional at the serde level so that an absent field can
/// be reported as [`ReportError::InvalidData`] by [`Self::validate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationRequest {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub sheets: Option<Vec<SheetInstruction>>,
}

impl AggregationRequest {
    pub fn new(path: impl Into<String>, sheets: Vec<SheetInstruction>) -> Self {
        Self {
            path: Some(path.into()),
            sheets: Some(sheets),
        }
    }

    /// Split into workbook path and instructions, rejecting absent fields.
    ///
    /// An empty instruction list is valid and yields an empty report.
    pub fn validate(self) -> Result<(String, Vec<SheetInstruction>), ReportError> {
        match (self.path, self.sheets) {
            (Some(path), Some(sheets)) if !path.trim().is_empty() => Ok((path, sheets)),
            _ => Err(ReportError::InvalidData),
        }
    }
}

// ── Report ───────────────────────────────────────────────────────────────

/// Column name → aggregate value, in request order.
pub type SheetValues = IndexMap<String, f64>;

/// Sheet name → column name → aggregate value.
///
/// Serialises as a plain nested JSON object. Integral values are written as
/// JSON integers (`6`, not `6.0`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Report(IndexMap<String, SheetValues>);

/// Largest magnitude below which every integral `f64` is exact.
const EXACT_INT_LIMIT: f64 = 9_007_199_254_740_992.0;

struct WireValues<'a>(&'a SheetValues);
struct WireNumber(f64);

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (sheet, values) in &self.0 {
            map.serialize_entry(sheet, &WireValues(values))?;
        }
        map.end()
    }
}

impl Serialize for WireValues<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, value) in self.0 {
            map.serialize_entry(column, &WireNumber(*value))?;
        }
        map.end()
    }
}

impl Serialize for WireNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let v = self.0;
        if v.fract() == 0.0 && v.abs() < EXACT_INT_LIMIT {
            serializer.serialize_i64(v as i64)
        } else {
            serializer.serialize_f64(v)
        }
    }
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sheet's values.
    ///
    /// Re-inserting a sheet replaces its values but keeps its original
    /// position.
    pub fn insert_sheet(&mut self, sheet: impl Into<String>, values: SheetValues) {
        self.0.insert(sheet.into(), values);
    }

    pub fn get(&self, sheet: &str) -> Option<&SheetValues> {
        self.0.get(sheet)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sheets and their values in insertion order.
    pub fn sheets(&self) -> impl Iterator<Item = (&str, &SheetValues)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// One scalar per sheet: the plain sum of its values.
    ///
    /// This is what the bar chart plots, whatever operation produced the
    /// values.
    pub fn sheet_totals(&self) -> Vec<(String, f64)> {
        self.0
            .iter()
            .map(|(name, values)| (name.clone(), values.values().sum()))
            .collect()
    }
}

impl FromIterator<(String, SheetValues)> for Report {
    fn from_iter<I: IntoIterator<Item = (String, SheetValues)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Body of a chart request: `{"sheets": Report}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartRequest {
    #[serde(default)]
    pub sheets: Option<Report>,
}

impl ChartRequest {
    pub fn into_report(self) -> Result<Report, ReportError> {
        self.sheets.ok_or(ReportError::MissingSheets)
    }
}

// ── Rendered output ──────────────────────────────────────────────────────

/// A generated document or image, held in memory for one response.
#[derive(Debug, Clone)]
pub struct RenderedArtifact {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    /// Download name offered to the client.
    pub filename: &'static str,
}

impl RenderedArtifact {
    pub fn pdf(bytes: Vec<u8>, filename: &'static str) -> Self {
        Self {
            bytes,
            content_type: "application/pdf",
            filename,
        }
    }

    pub fn png(bytes: Vec<u8>, filename: &'static str) -> Self {
        Self {
            bytes,
            content_type: "image/png",
            filename,
        }
    }
}
