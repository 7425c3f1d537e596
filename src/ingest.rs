//! File ingestion: delimited text and spreadsheet workbooks into a
//! [`RawTable`].
//!
//! A raw table is the untyped cell grid exactly as uploaded: no header has
//! been chosen yet and nothing has been trimmed or dropped. It is created
//! once per upload and never mutated; normalization derives everything else
//! from it.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto};
use log::info;

use crate::{error::DashboardError, io_utils};

/// Physical format of an uploaded file, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Delimited { delimiter: u8 },
    Spreadsheet,
}

impl SourceFormat {
    /// Classifies a path, or reports [`DashboardError::UnsupportedFormat`]
    /// for anything that is neither delimited text nor a spreadsheet.
    pub fn detect(path: &Path) -> Result<Self, DashboardError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" | "tsv" | "txt" => Ok(SourceFormat::Delimited {
                delimiter: io_utils::resolve_input_delimiter(path),
            }),
            "xls" | "xlsx" | "xlsm" | "xlsb" => Ok(SourceFormat::Spreadsheet),
            _ => Err(DashboardError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// The uploaded cell grid, immutable after load.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub rows: Vec<Vec<String>>,
    pub format: SourceFormat,
}

impl RawTable {
    /// Builds a raw table directly from in-memory rows. Used by callers
    /// that already hold tabular data (and by tests).
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        RawTable {
            rows,
            format: SourceFormat::Delimited {
                delimiter: io_utils::DEFAULT_CSV_DELIMITER,
            },
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reads an uploaded file into a [`RawTable`]. Unrecognized formats are
/// fatal for this upload; the caller's previous state stays live.
pub fn load_raw_table(path: &Path) -> Result<RawTable> {
    let format = SourceFormat::detect(path)?;
    let rows = match format {
        SourceFormat::Delimited { delimiter } => read_delimited(path, delimiter)?,
        SourceFormat::Spreadsheet => read_spreadsheet(path)?,
    };
    info!(
        "Loaded {} row(s) from '{}'",
        rows.len(),
        path.display()
    );
    Ok(RawTable { rows, format })
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<Vec<Vec<String>>> {
    let encoding = io_utils::resolve_encoding(None)?;
    let mut reader = io_utils::open_raw_reader_from_path(path, delimiter)?;
    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 1))?;
        rows.push(io_utils::decode_record(&record, encoding)?);
    }
    Ok(rows)
}

fn read_spreadsheet(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Opening spreadsheet {path:?}"))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("Spreadsheet {path:?} has no worksheets"))?
        .with_context(|| format!("Reading first worksheet of {path:?}"))?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(render_cell).collect())
        .collect())
}

/// Renders a spreadsheet cell to the text the normalizer expects. Date
/// cells come out ISO-formatted so the date parser reads them back; error
/// cells become empty (the missing marker downstream).
fn render_cell(cell: &Data) -> String {
    use calamine::DataType as CalamineTrait;
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) => match CalamineTrait::as_datetime(cell) {
            Some(dt) if dt.time() == chrono::NaiveTime::MIN => {
                dt.date().format("%Y-%m-%d").to_string()
            }
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => String::new(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}
