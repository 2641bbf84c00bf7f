//! Aggregate: compute per-column sum/average over workbook sheets.
//!
//! ## Table shape
//!
//! A sheet's used range is read as a table whose first row holds the column
//! names and whose remaining rows are data. Header cells are stringified;
//! an empty header cell becomes `Unnamed: <index>` and a repeated name gets a
//! `.1`, `.2`, … suffix so every column stays addressable.
//!
//! ## Numeric coercion
//!
//! Only `Int` and `Float` cells count. Empty cells, text, booleans, dates and
//! error cells are skipped by both operations, and the mean divides by the
//! number of numeric cells. A sum over no numeric cells is `0`; an average
//! over none is an error because NaN cannot be sent back as JSON.

use crate::error::ReportError;
use crate::report::{Operation, Report, SheetInstruction, SheetValues};
use calamine::{Data, Range, Reader, Xlsx};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A sheet read into memory: header names plus data rows.
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Data>>,
}

impl Table {
    /// Build a table from a calamine range; the first row is the header.
    pub fn from_range(range: &Range<Data>) -> Self {
        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            return Self::default();
        };
        Self {
            headers: header_names(header_row),
            rows: rows.map(<[Data]>::to_vec).collect(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Numeric values of one column, skipping non-numeric cells.
    pub fn numeric_values(&self, idx: usize) -> impl Iterator<Item = f64> + '_ {
        self.rows
            .iter()
            .filter_map(move |row| row.get(idx).and_then(numeric))
    }
}

fn numeric(cell: &Data) -> Option<f64> {
    match cell {
        Data::Int(i) => Some(*i as f64),
        Data::Float(f) => Some(*f),
        _ => None,
    }
}

fn header_names(row: &[Data]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    row.iter()
        .enumerate()
        .map(|(idx, cell)| {
            let base = match cell {
                Data::Empty => format!("Unnamed: {idx}"),
                Data::String(s) => s.clone(),
                other => other.to_string(),
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

/// Apply `op` to one column of `table`.
pub fn aggregate_column(
    table: &Table,
    sheet: &str,
    column: &str,
    op: Operation,
) -> Result<f64, ReportError> {
    let idx = table
        .column_index(column)
        .ok_or_else(|| ReportError::ColumnNotFound {
            sheet: sheet.to_string(),
            column: column.to_string(),
        })?;

    let (sum, count) = table
        .numeric_values(idx)
        .fold((0.0_f64, 0_usize), |(s, n), v| (s + v, n + 1));

    let value = match op {
        Operation::Sum => sum,
        Operation::Average if count == 0 => {
            return Err(ReportError::NoNumericValues {
                sheet: sheet.to_string(),
                column: column.to_string(),
            });
        }
        Operation::Average if sum.is_finite() => sum / count as f64,
        // the running sum overflowed; the mean itself may still fit
        Operation::Average => table
            .numeric_values(idx)
            .map(|v| v / count as f64)
            .sum::<f64>(),
    };

    if !value.is_finite() {
        return Err(ReportError::NonFiniteResult {
            sheet: sheet.to_string(),
            column: column.to_string(),
        });
    }
    Ok(value)
}

/// Apply `op` to every requested column, keeping request order.
pub fn aggregate_sheet(
    table: &Table,
    sheet: &str,
    op: Operation,
    columns: &[String],
) -> Result<SheetValues, ReportError> {
    columns
        .iter()
        .map(|col| -> Result<(String, f64), ReportError> {
            Ok((col.clone(), aggregate_column(table, sheet, col, op)?))
        })
        .collect()
}

/// Resolve the workbook path of an aggregation request.
///
/// The path is taken as given when it exists. A relative path that does not
/// is looked up in the upload directory, so the `filename` returned by ingest
/// works on its own.
pub fn resolve_workbook_path(upload_dir: &Path, path: &str) -> Result<PathBuf, ReportError> {
    let given = PathBuf::from(path);
    if given.is_file() {
        return Ok(given);
    }
    if given.is_relative() {
        let in_uploads = upload_dir.join(&given);
        if in_uploads.is_file() {
            return Ok(in_uploads);
        }
    }
    Err(ReportError::FileNotFound { path: given })
}

fn open_xlsx(path: &Path) -> Result<Xlsx<std::io::BufReader<std::fs::File>>, ReportError> {
    calamine::open_workbook(path).map_err(|e: calamine::XlsxError| ReportError::InvalidWorkbook {
        name: path.display().to_string(),
        detail: e.to_string(),
    })
}

/// Run every instruction against the workbook at `path`.
///
/// The first failing instruction aborts the whole request; no partial
/// report is returned.
pub fn aggregate(path: &Path, instructions: &[SheetInstruction]) -> Result<Report, ReportError> {
    let mut report = Report::new();
    if instructions.is_empty() {
        return Ok(report);
    }

    let mut workbook = open_xlsx(path)?;
    let sheet_names = workbook.sheet_names();

    for instruction in instructions {
        let sheet = instruction.sheet.as_str();
        if !sheet_names.iter().any(|s| s == sheet) {
            return Err(ReportError::SheetNotFound {
                sheet: sheet.to_string(),
            });
        }
        let op: Operation = instruction.operation.parse()?;

        let range = workbook
            .worksheet_range(sheet)
            .map_err(|e| ReportError::InvalidWorkbook {
                name: path.display().to_string(),
                detail: format!("sheet {sheet}: {e}"),
            })?;
        let table = Table::from_range(&range);
        debug!(
            "Sheet '{}': {} columns, {} rows",
            sheet,
            table.headers().len(),
            table.row_count()
        );

        let values = aggregate_sheet(&table, sheet, op, &instruction.columns)?;
        report.insert_sheet(sheet, values);
    }

    info!(
        "Aggregated {} instructions over {} sheets from {}",
        instructions.len(),
        report.len(),
        path.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(cells: Vec<Vec<Data>>) -> Range<Data> {
        let height = cells.len() as u32;
        let width = cells.iter().map(Vec::len).max().unwrap_or(0) as u32;
        let mut range = Range::new((0, 0), (height - 1, width - 1));
        for (r, row) in cells.into_iter().enumerate() {
            for (c, cell) in row.into_iter().enumerate() {
                range.set_value((r as u32, c as u32), cell);
            }
        }
        range
    }

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    fn table() -> Table {
        Table::from_range(&range(vec![
            vec![s("A"), s("B"), s("Label")],
            vec![Data::Float(1.0), Data::Int(10), s("x")],
            vec![Data::Float(2.0), Data::Empty, s("y")],
            vec![Data::Float(3.0), s("n/a"), s("z")],
        ]))
    }

    #[test]
    fn sum_of_column() {
        assert_eq!(
            aggregate_column(&table(), "Sheet1", "A", Operation::Sum).unwrap(),
            6.0
        );
    }

    #[test]
    fn average_of_column() {
        assert_eq!(
            aggregate_column(&table(), "Sheet1", "A", Operation::Average).unwrap(),
            2.0
        );
    }

    #[test]
    fn non_numeric_cells_are_skipped() {
        let t = table();
        assert_eq!(aggregate_column(&t, "S", "B", Operation::Sum).unwrap(), 10.0);
        // mean over the single numeric cell, not over three rows
        assert_eq!(
            aggregate_column(&t, "S", "B", Operation::Average).unwrap(),
            10.0
        );
    }

    #[test]
    fn text_only_column() {
        let t = table();
        assert_eq!(
            aggregate_column(&t, "S", "Label", Operation::Sum).unwrap(),
            0.0
        );
        assert!(matches!(
            aggregate_column(&t, "S", "Label", Operation::Average),
            Err(ReportError::NoNumericValues { .. })
        ));
    }

    #[test]
    fn overflowing_sum_is_rejected() {
        let t = Table::from_range(&range(vec![
            vec![s("Big")],
            vec![Data::Float(1.7e308)],
            vec![Data::Float(1.7e308)],
        ]));
        let err = aggregate_column(&t, "S", "Big", Operation::Sum).unwrap_err();
        assert!(matches!(err, ReportError::NonFiniteResult { .. }));
        assert_eq!(err.to_string(), "Column Big in sheet S overflows");

        // the mean of the same cells is representable
        assert_eq!(
            aggregate_column(&t, "S", "Big", Operation::Average).unwrap(),
            1.7e308
        );
    }

    #[test]
    fn missing_column() {
        let err = aggregate_column(&table(), "Sheet1", "Z", Operation::Sum).unwrap_err();
        match err {
            ReportError::ColumnNotFound { sheet, column } => {
                assert_eq!(sheet, "Sheet1");
                assert_eq!(column, "Z");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn sheet_values_keep_request_order() {
        let cols = vec!["B".to_string(), "A".to_string()];
        let values = aggregate_sheet(&table(), "S", Operation::Sum, &cols).unwrap();
        let keys: Vec<&String> = values.keys().collect();
        assert_eq!(keys, vec!["B", "A"]);
    }

    #[test]
    fn one_bad_column_fails_the_sheet() {
        let cols = vec!["A".to_string(), "nope".to_string()];
        assert!(aggregate_sheet(&table(), "S", Operation::Sum, &cols).is_err());
    }

    #[test]
    fn header_names_fill_and_dedupe() {
        let t = Table::from_range(&range(vec![vec![
            s("A"),
            Data::Empty,
            s("A"),
            Data::Float(2024.0),
            s("A"),
        ]]));
        assert_eq!(t.headers(), &["A", "Unnamed: 1", "A.1", "2024", "A.2"]);
        assert_eq!(t.row_count(), 0);
    }

    #[test]
    fn empty_range_is_empty_table() {
        let t = Table::from_range(&Range::<Data>::empty());
        assert!(t.headers().is_empty());
        assert_eq!(t.row_count(), 0);
    }

    #[test]
    fn resolve_prefers_given_path_then_upload_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("book.xlsx"), b"x").unwrap();

        let resolved = resolve_workbook_path(dir.path(), "book.xlsx").unwrap();
        assert_eq!(resolved, dir.path().join("book.xlsx"));

        let absolute = dir.path().join("book.xlsx");
        let resolved =
            resolve_workbook_path(Path::new("/nowhere"), absolute.to_str().unwrap()).unwrap();
        assert_eq!(resolved, absolute);

        assert!(matches!(
            resolve_workbook_path(dir.path(), "other.xlsx"),
            Err(ReportError::FileNotFound { .. })
        ));
    }

    #[test]
    fn empty_instructions_do_not_open_the_file() {
        let report = aggregate(Path::new("/does/not/exist.xlsx"), &[]).unwrap();
        assert!(report.is_empty());
    }
}
