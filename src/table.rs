//! Normalized tables: the raw cell grid with a header row applied, noise
//! trimmed away, and cells typed according to their canonical field role.

use chrono::NaiveDate;
use itertools::Itertools;
use log::debug;
use serde::Serialize;

use crate::{
    data::{self, Value},
    ingest::RawTable,
    schema::{CanonicalField, FieldMapping, FieldRole, HeaderDetection},
};

fn synthetic_field_name(idx: usize) -> String {
    format!("field_{idx}")
}

/// A raw table after header application and cleanup:
///
/// - header names and cells trimmed of whitespace;
/// - rows above the header (preamble) discarded;
/// - fully-empty rows and fully-empty columns dropped;
/// - unnamed columns that still carry data given synthetic names;
/// - date- and quantity-role cells parsed, with unparseable cells held as
///   the explicit missing marker while the rest of the row survives.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NormalizedTable {
    headers: Vec<String>,
    rows: Vec<Vec<Option<Value>>>,
}

impl NormalizedTable {
    /// Applies `detection`'s header row to `raw` and types the surviving
    /// cells against `mapping`. Pure; the raw table is left untouched.
    pub fn build(raw: &RawTable, detection: HeaderDetection, mapping: &FieldMapping) -> Self {
        let Some(header_row) = raw.rows.get(detection.row) else {
            return NormalizedTable {
                headers: Vec::new(),
                rows: Vec::new(),
            };
        };
        let data_rows = &raw.rows[detection.row + 1..];
        let width = raw
            .rows
            .iter()
            .skip(detection.row)
            .map(|row| row.len())
            .max()
            .unwrap_or(0);

        let trimmed_headers: Vec<String> = (0..width)
            .map(|idx| {
                header_row
                    .get(idx)
                    .map(|name| name.trim().to_string())
                    .unwrap_or_default()
            })
            .collect();

        let keep: Vec<usize> = (0..width)
            .filter(|&idx| {
                !trimmed_headers[idx].is_empty()
                    || data_rows
                        .iter()
                        .any(|row| row.get(idx).is_some_and(|cell| !cell.trim().is_empty()))
            })
            .collect();

        let headers: Vec<String> = keep
            .iter()
            .map(|&idx| {
                if trimmed_headers[idx].is_empty() {
                    synthetic_field_name(idx)
                } else {
                    trimmed_headers[idx].clone()
                }
            })
            .collect();

        let roles: Vec<FieldRole> = headers
            .iter()
            .map(|header| {
                CanonicalField::ALL
                    .into_iter()
                    .find(|field| mapping.column(*field) == Some(header.as_str()))
                    .map(|field| field.role())
                    .unwrap_or(FieldRole::Text)
            })
            .collect();

        let rows: Vec<Vec<Option<Value>>> = data_rows
            .iter()
            .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .map(|row| {
                keep.iter()
                    .zip(&roles)
                    .map(|(&idx, role)| {
                        let raw_cell = row.get(idx).map(|cell| cell.as_str()).unwrap_or("");
                        match role {
                            FieldRole::Date => data::parse_date_cell(raw_cell),
                            FieldRole::Quantity => data::parse_quantity_cell(raw_cell),
                            FieldRole::Text => data::parse_text_cell(raw_cell),
                        }
                    })
                    .collect()
            })
            .collect();

        debug!(
            "Normalized table: {} row(s), {} column(s) (dropped {} empty column(s))",
            rows.len(),
            headers.len(),
            width - keep.len()
        );
        NormalizedTable { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Option<Value>>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Index of the column a canonical field is bound to, or `None` when
    /// the field is unmapped or its column did not survive normalization.
    pub fn field_index(&self, mapping: &FieldMapping, field: CanonicalField) -> Option<usize> {
        mapping
            .column(field)
            .and_then(|column| self.column_index(column))
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|cells| cells.get(column))?.as_ref()
    }

    /// Distinct display values of a mapped field in first-seen order, for
    /// filter widget option lists. `None` when the field is unmapped.
    pub fn distinct_values(
        &self,
        mapping: &FieldMapping,
        field: CanonicalField,
    ) -> Option<Vec<String>> {
        let idx = self.field_index(mapping, field)?;
        Some(
            self.rows
                .iter()
                .filter_map(|row| row.get(idx).and_then(|cell| cell.as_ref()))
                .map(Value::as_display)
                .unique()
                .collect(),
        )
    }

    /// Minimum and maximum calendar dates of a mapped date field, for
    /// date-picker initialisation. `None` when the field is unmapped or no
    /// cell parsed as a date.
    pub fn date_bounds(
        &self,
        mapping: &FieldMapping,
        field: CanonicalField,
    ) -> Option<(NaiveDate, NaiveDate)> {
        let idx = self.field_index(mapping, field)?;
        let mut bounds: Option<(NaiveDate, NaiveDate)> = None;
        for row in &self.rows {
            let Some(date) = row.get(idx).and_then(|cell| cell.as_ref()).and_then(Value::as_date)
            else {
                continue;
            };
            bounds = Some(match bounds {
                None => (date, date),
                Some((min, max)) => (min.min(date), max.max(date)),
            });
        }
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{self, HEADER_KEYWORDS, HEADER_SCAN_ROWS};
    use chrono::NaiveDate;

    fn raw(rows: &[&[&str]]) -> RawTable {
        RawTable::from_rows(
            rows.iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect(),
        )
    }

    fn build(raw_table: &RawTable) -> (NormalizedTable, FieldMapping) {
        let detection =
            schema::detect_header_row(&raw_table.rows, HEADER_KEYWORDS, HEADER_SCAN_ROWS);
        let headers: Vec<String> = raw_table.rows[detection.row]
            .iter()
            .map(|name| name.trim().to_string())
            .collect();
        let mapping = schema::resolve_mapping(&headers);
        let table = NormalizedTable::build(raw_table, detection, &mapping);
        (table, mapping)
    }

    #[test]
    fn build_applies_header_and_types_cells() {
        let raw_table = raw(&[
            &["Quarterly dump", ""],
            &["Order ID", "CreateDate", "Order Qty", "Status"],
            &["387249", "2025-08-25", "131", "Confirmed"],
            &["387250", "not a date", "NA", "Pending"],
        ]);
        let (table, mapping) = build(&raw_table);
        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.headers(),
            &["Order ID", "CreateDate", "Order Qty", "Status"]
        );

        let create_idx = table
            .field_index(&mapping, CanonicalField::CreateDate)
            .unwrap();
        assert_eq!(
            table.cell(0, create_idx),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2025, 8, 25).unwrap()))
        );
        // Unparseable date and quantity become missing markers; row stays.
        assert_eq!(table.cell(1, create_idx), None);
        let qty_idx = table
            .field_index(&mapping, CanonicalField::OrderQty)
            .unwrap();
        assert_eq!(table.cell(1, qty_idx), None);
        assert_eq!(table.cell(0, qty_idx), Some(&Value::Integer(131)));
    }

    #[test]
    fn build_drops_empty_rows_and_columns() {
        let raw_table = raw(&[
            &["Order ID", "Status", ""],
            &["1", "Delivered", ""],
            &["", "", ""],
            &["2", "Pending", ""],
        ]);
        let (table, _) = build(&raw_table);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.headers(), &["Order ID", "Status"]);
    }

    #[test]
    fn unnamed_column_with_data_gets_synthetic_name() {
        let raw_table = raw(&[
            &["Order ID", "Status", ""],
            &["1", "Delivered", "note"],
        ]);
        let (table, _) = build(&raw_table);
        assert_eq!(table.headers(), &["Order ID", "Status", "field_2"]);
    }

    #[test]
    fn distinct_values_keep_first_seen_order() {
        let raw_table = raw(&[
            &["Plant Name", "Order Qty"],
            &["Manukan", "10"],
            &["Talisay", "5"],
            &["Manukan", "2"],
        ]);
        let (table, mapping) = build(&raw_table);
        assert_eq!(
            table.distinct_values(&mapping, CanonicalField::PlantName),
            Some(vec!["Manukan".to_string(), "Talisay".to_string()])
        );
        assert_eq!(
            table.distinct_values(&mapping, CanonicalField::PaymentType),
            None
        );
    }

    #[test]
    fn date_bounds_skip_missing_cells() {
        let raw_table = raw(&[
            &["CreateDate", "Order Qty"],
            &["2025-08-26", "1"],
            &["garbage", "2"],
            &["2025-08-24", "3"],
        ]);
        let (table, mapping) = build(&raw_table);
        assert_eq!(
            table.date_bounds(&mapping, CanonicalField::CreateDate),
            Some((
                NaiveDate::from_ymd_opt(2025, 8, 24).unwrap(),
                NaiveDate::from_ymd_opt(2025, 8, 26).unwrap()
            ))
        );
    }
}
