//! CSV export of a filtered view.
//!
//! The download path writes through the same quoting rules the input path
//! parses, so an exported file re-ingested by the resolver produces
//! identical cell values for every mapped canonical field.

use std::{io::Write, path::Path};

use anyhow::{Context, Result};
use log::info;

use crate::{
    data::Value,
    error::DashboardError,
    filter::FilteredView,
    io_utils,
    schema::{CanonicalField, FieldMapping},
};

/// Writes `view` restricted to `fields`, in the given order, as CSV.
/// Headers are the mapped actual column names. Requesting a field that is
/// not mapped is a [`DashboardError::MissingRequiredColumn`].
pub fn write_csv(
    view: &FilteredView<'_>,
    mapping: &FieldMapping,
    fields: &[CanonicalField],
    path: &Path,
) -> Result<()> {
    let writer = io_utils::open_csv_writer(path)?;
    write_records(view, mapping, fields, writer)?;
    info!(
        "Exported {} row(s) x {} column(s) to '{}'",
        view.len(),
        fields.len(),
        path.display()
    );
    Ok(())
}

/// Writer-generic variant of [`write_csv`] for callers that stream the
/// download instead of touching the filesystem.
pub fn write_csv_to<W: Write>(
    view: &FilteredView<'_>,
    mapping: &FieldMapping,
    fields: &[CanonicalField],
    writer: W,
) -> Result<()> {
    write_records(view, mapping, fields, io_utils::csv_writer_from(writer))
}

fn write_records<W: Write>(
    view: &FilteredView<'_>,
    mapping: &FieldMapping,
    fields: &[CanonicalField],
    mut writer: csv::Writer<W>,
) -> Result<()> {
    let table = view.table();
    let mut columns = Vec::with_capacity(fields.len());
    let mut headers = Vec::with_capacity(fields.len());
    for &field in fields {
        let idx = table
            .field_index(mapping, field)
            .ok_or(DashboardError::MissingRequiredColumn { field })?;
        columns.push(idx);
        headers.push(table.headers()[idx].clone());
    }

    writer.write_record(&headers).context("Writing CSV header")?;
    for (row_number, row) in view.iter_rows().enumerate() {
        let record: Vec<String> = columns
            .iter()
            .map(|&idx| {
                row.get(idx)
                    .and_then(|cell| cell.as_ref())
                    .map(Value::as_display)
                    .unwrap_or_default()
            })
            .collect();
        writer
            .write_record(&record)
            .with_context(|| format!("Writing CSV row {}", row_number + 1))?;
    }
    writer.flush().context("Flushing CSV output")?;
    Ok(())
}
