//! Filter criteria and view computation.
//!
//! A [`FilterCriteria`] is a conjunction of independent predicates: two
//! inclusive date ranges and three category memberships. An absent
//! predicate leaves its dimension unrestricted; a predicate over an
//! unmapped canonical field is vacuously true. Filtering never mutates the
//! table — it produces a [`FilteredView`] of retained row indices.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    data::Value,
    error::DashboardError,
    schema::{CanonicalField, FieldMapping},
    table::NormalizedTable,
};

/// Inclusive calendar-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

impl DateRange {
    pub fn new(min: NaiveDate, max: NaiveDate) -> Self {
        DateRange { min, max }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.min <= date && date <= self.max
    }
}

/// The user's current filter selections. `None` on any predicate means
/// "no restriction on that dimension".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plants: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statuses: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_types: Option<BTreeSet<String>>,
}

impl FilterCriteria {
    pub fn is_unrestricted(&self) -> bool {
        self == &FilterCriteria::default()
    }

    /// Routes a category selection coming from a UI control, addressed by
    /// field name. Unknown names and non-categorical fields are an
    /// [`DashboardError::InvalidFilterConfiguration`]: loud in development,
    /// and cheap for a production caller to drop on the floor.
    pub fn set_categories(
        &mut self,
        field_name: &str,
        values: BTreeSet<String>,
    ) -> Result<(), DashboardError> {
        let field = CanonicalField::from_name(field_name).ok_or_else(|| {
            DashboardError::invalid_filter(format!("unknown field '{field_name}'"))
        })?;
        match field {
            CanonicalField::PlantName => self.plants = Some(values),
            CanonicalField::Status => self.statuses = Some(values),
            CanonicalField::PaymentType => self.payment_types = Some(values),
            other => {
                return Err(DashboardError::invalid_filter(format!(
                    "field '{other}' does not take a category filter"
                )));
            }
        }
        Ok(())
    }

    /// Routes a date-range selection addressed by field name; same error
    /// contract as [`FilterCriteria::set_categories`].
    pub fn set_date_range(
        &mut self,
        field_name: &str,
        range: DateRange,
    ) -> Result<(), DashboardError> {
        let field = CanonicalField::from_name(field_name).ok_or_else(|| {
            DashboardError::invalid_filter(format!("unknown field '{field_name}'"))
        })?;
        match field {
            CanonicalField::CreateDate => self.create_date = Some(range),
            CanonicalField::DeliveryDate => self.delivery_date = Some(range),
            other => {
                return Err(DashboardError::invalid_filter(format!(
                    "field '{other}' does not take a date-range filter"
                )));
            }
        }
        Ok(())
    }
}

/// The rows of a table that satisfy some criteria, by index. Holds a
/// borrow of the table so the aggregation functions can read cells without
/// copying rows.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    table: &'a NormalizedTable,
    rows: Vec<usize>,
}

impl<'a> FilteredView<'a> {
    /// The identity view: every row of `table`.
    pub fn all(table: &'a NormalizedTable) -> Self {
        FilteredView {
            table,
            rows: (0..table.row_count()).collect(),
        }
    }

    pub fn table(&self) -> &'a NormalizedTable {
        self.table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_indices(&self) -> &[usize] {
        &self.rows
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &'a [Option<Value>]> + '_ {
        self.rows
            .iter()
            .map(|&idx| self.table.rows()[idx].as_slice())
    }
}

/// Applies the conjunction of `criteria`'s predicates to `view`. Pure and
/// idempotent; applying all-absent criteria returns an equal view.
pub fn apply<'a>(
    view: &FilteredView<'a>,
    mapping: &FieldMapping,
    criteria: &FilterCriteria,
) -> FilteredView<'a> {
    let table = view.table();
    let create_idx = table.field_index(mapping, CanonicalField::CreateDate);
    let delivery_idx = table.field_index(mapping, CanonicalField::DeliveryDate);
    let plant_idx = table.field_index(mapping, CanonicalField::PlantName);
    let status_idx = table.field_index(mapping, CanonicalField::Status);
    let payment_idx = table.field_index(mapping, CanonicalField::PaymentType);

    let rows = view
        .row_indices()
        .iter()
        .copied()
        .filter(|&row| {
            date_matches(table, row, create_idx, criteria.create_date.as_ref())
                && date_matches(table, row, delivery_idx, criteria.delivery_date.as_ref())
                && category_matches(table, row, plant_idx, criteria.plants.as_ref())
                && category_matches(table, row, status_idx, criteria.statuses.as_ref())
                && category_matches(table, row, payment_idx, criteria.payment_types.as_ref())
        })
        .collect();
    FilteredView {
        table: view.table(),
        rows,
    }
}

/// A missing or unparseable date never satisfies an explicit range; an
/// unmapped column makes the predicate vacuously true.
fn date_matches(
    table: &NormalizedTable,
    row: usize,
    column: Option<usize>,
    range: Option<&DateRange>,
) -> bool {
    let Some(range) = range else {
        return true;
    };
    let Some(column) = column else {
        return true;
    };
    table
        .cell(row, column)
        .and_then(Value::as_date)
        .is_some_and(|date| range.contains(date))
}

fn category_matches(
    table: &NormalizedTable,
    row: usize,
    column: Option<usize>,
    selection: Option<&BTreeSet<String>>,
) -> bool {
    let Some(selection) = selection else {
        return true;
    };
    let Some(column) = column else {
        return true;
    };
    let value = table
        .cell(row, column)
        .map(Value::as_display)
        .unwrap_or_default();
    selection.contains(&value)
}
