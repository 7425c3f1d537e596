//! Session state and the dashboard snapshot.
//!
//! The only shared mutable resource in the system is the current session:
//! one dataset (raw grid, header detection, mapping, normalized table) plus
//! the active filter selections. It has a single writer and is replaced
//! wholesale on every interaction, so a table is never observable next to
//! a stale mapping. A failed upload leaves the previous state untouched.

use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use log::{debug, info};
use serde::Serialize;

use crate::{
    filter::{self, FilterCriteria, FilteredView},
    ingest::{self, RawTable},
    metrics::{self, MetricsSummary},
    schema::{
        self, CanonicalField, FieldBinding, FieldMapping, HeaderDetection, HEADER_KEYWORDS,
        HEADER_SCAN_ROWS,
    },
    table::NormalizedTable,
};

/// Everything derived from one uploaded file, built in full before the
/// session swaps it in.
#[derive(Debug, Clone)]
pub struct DatasetState {
    raw: RawTable,
    pub detection: HeaderDetection,
    pub mapping: FieldMapping,
    pub table: NormalizedTable,
    pub criteria: FilterCriteria,
}

impl DatasetState {
    /// Runs the full pipeline over an already-loaded raw grid: header
    /// detection, mapping resolution, normalization.
    pub fn from_raw(raw: RawTable) -> Self {
        let detection = schema::detect_header_row(&raw.rows, HEADER_KEYWORDS, HEADER_SCAN_ROWS);
        if detection.fallback {
            debug!("No header keywords matched; defaulting to row 0");
        }
        let headers: Vec<String> = raw
            .rows
            .get(detection.row)
            .map(|row| row.iter().map(|name| name.trim().to_string()).collect())
            .unwrap_or_default();
        let mapping = schema::resolve_mapping(&headers);
        let table = NormalizedTable::build(&raw, detection, &mapping);
        info!(
            "Dataset ready: {} row(s), {} of {} canonical field(s) mapped",
            table.row_count(),
            mapping
                .entries()
                .iter()
                .filter(|(_, binding)| binding.column().is_some())
                .count(),
            CanonicalField::ALL.len()
        );
        DatasetState {
            raw,
            detection,
            mapping,
            table,
            criteria: FilterCriteria::default(),
        }
    }

    /// Loads and prepares a dataset from an uploaded file. Any error here
    /// happens before the session is touched.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = ingest::load_raw_table(path)?;
        Ok(DatasetState::from_raw(raw))
    }

    /// Replaces the filter selections, consuming and returning the whole
    /// state.
    pub fn with_criteria(mut self, criteria: FilterCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    /// Applies a manual mapping choice and rebuilds the normalized table
    /// from the immutable raw grid, since cell typing follows the mapping.
    pub fn with_field_override(mut self, field: CanonicalField, column: Option<String>) -> Self {
        self.mapping.set_manual(field, column);
        self.table = NormalizedTable::build(&self.raw, self.detection, &self.mapping);
        self
    }

    pub fn filtered_view(&self) -> FilteredView<'_> {
        filter::apply(
            &FilteredView::all(&self.table),
            &self.mapping,
            &self.criteria,
        )
    }
}

/// The current session. `dataset` is `None` until the first successful
/// upload.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    dataset: Option<DatasetState>,
}

impl SessionState {
    pub fn new() -> Self {
        SessionState::default()
    }

    pub fn dataset(&self) -> Option<&DatasetState> {
        self.dataset.as_ref()
    }

    /// Atomically replaces the current dataset and all derived views.
    pub fn replace(&mut self, dataset: DatasetState) {
        self.dataset = Some(dataset);
    }

    /// Loads a new file and swaps it in. On error the previous dataset
    /// (and everything derived from it) remains active.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let dataset = DatasetState::load(path)?;
        self.replace(dataset);
        Ok(())
    }

    /// Replaces the filter selections. No-op before the first upload.
    pub fn update_criteria(&mut self, criteria: FilterCriteria) {
        if let Some(dataset) = self.dataset.take() {
            self.dataset = Some(dataset.with_criteria(criteria));
        }
    }

    /// Applies a manual mapping override. No-op before the first upload.
    pub fn override_field(&mut self, field: CanonicalField, column: Option<String>) {
        if let Some(dataset) = self.dataset.take() {
            self.dataset = Some(dataset.with_field_override(field, column));
        }
    }

    /// One full synchronous recompute of everything the presentation layer
    /// renders. `None` before the first successful upload.
    pub fn snapshot(&self) -> Option<DashboardSnapshot> {
        let dataset = self.dataset.as_ref()?;
        let view = dataset.filtered_view();
        let mapping = &dataset.mapping;
        let table = &dataset.table;

        let grid = GridData {
            headers: table.headers().to_vec(),
            rows: view
                .iter_rows()
                .map(|row| {
                    row.iter()
                        .map(|cell| {
                            cell.as_ref().map(|value| value.as_display()).unwrap_or_default()
                        })
                        .collect()
                })
                .collect(),
        };

        let filter_options = FilterOptions {
            plants: table.distinct_values(mapping, CanonicalField::PlantName),
            statuses: table.distinct_values(mapping, CanonicalField::Status),
            payment_types: table.distinct_values(mapping, CanonicalField::PaymentType),
            create_date_bounds: table.date_bounds(mapping, CanonicalField::CreateDate),
            delivery_date_bounds: table.date_bounds(mapping, CanonicalField::DeliveryDate),
        };

        Some(DashboardSnapshot {
            detection: dataset.detection,
            mapping: mapping.entries(),
            summary: metrics::summarize(&view, mapping),
            status_breakdown: metrics::group_by_status(&view, mapping),
            plant_totals: metrics::group_by_plant(&view, mapping),
            payment_distribution: metrics::group_by_payment(&view, mapping),
            daily_orders: metrics::daily_order_trend(&view, mapping),
            filter_options,
            grid,
        })
    }
}

/// Detail-table payload: display strings only, ready for a data grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Option lists and date bounds for initialising the filter widgets.
/// `None` entries mean the backing field is unmapped and the widget should
/// not render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    pub plants: Option<Vec<String>>,
    pub statuses: Option<Vec<String>>,
    pub payment_types: Option<Vec<String>>,
    pub create_date_bounds: Option<(NaiveDate, NaiveDate)>,
    pub delivery_date_bounds: Option<(NaiveDate, NaiveDate)>,
}

/// Everything the presentation layer renders for one interaction, computed
/// in one pass. Serializes to JSON for the browser side.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub detection: HeaderDetection,
    pub mapping: Vec<(CanonicalField, FieldBinding)>,
    pub summary: MetricsSummary,
    pub status_breakdown: Option<Vec<(String, usize)>>,
    pub plant_totals: Option<Vec<(String, f64)>>,
    pub payment_distribution: Option<Vec<(String, usize)>>,
    pub daily_orders: Option<Vec<(NaiveDate, usize)>>,
    pub filter_options: FilterOptions,
    pub grid: GridData,
}

impl DashboardSnapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Into::into)
    }
}
