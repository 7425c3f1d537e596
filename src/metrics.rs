//! Derived metrics and chart-ready aggregates over a filtered view.
//!
//! Everything here is a pure function of (view, mapping): no state, no
//! side effects, recomputed in full on every interaction. Aggregates over
//! a field that is unmapped come back as `None` so the presentation layer
//! can render "N/A" or omit the dependent chart while the rest of the
//! dashboard still draws.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    data::Value,
    filter::FilteredView,
    schema::{CanonicalField, FieldMapping},
};

// Case-insensitive substring tokens bucketing status strings. A status
// matching several tokens is counted in every bucket it matches.
const DELIVERED_TOKEN: &str = "delivered";
const PENDING_TOKEN: &str = "pending";
const CANCEL_TOKEN: &str = "cancel";

const CASH_TOKEN: &str = "cash";
const CREDIT_TOKEN: &str = "credit";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusBuckets {
    pub delivered: usize,
    pub pending: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PaymentBuckets {
    pub cash: usize,
    pub credit: usize,
}

/// Read-only aggregate over a filtered view. `None` fields mean the
/// backing canonical column is not mapped in this dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub total_orders: usize,
    pub order_qty_total: Option<f64>,
    pub actual_delivery_total: Option<f64>,
    pub status: Option<StatusBuckets>,
    pub payment: Option<PaymentBuckets>,
    /// ActualDelivery / OrderQty; 0 when the quantity total is 0.
    pub delivery_ratio: Option<f64>,
    /// OrderQty / row count; 0 for an empty view.
    pub average_order_qty: Option<f64>,
}

/// Sum of a quantity column across the view. Missing and non-numeric cells
/// contribute 0 rather than failing the aggregation.
fn sum_field(view: &FilteredView<'_>, mapping: &FieldMapping, field: CanonicalField) -> Option<f64> {
    let idx = view.table().field_index(mapping, field)?;
    Some(
        view.iter_rows()
            .filter_map(|row| row.get(idx).and_then(|cell| cell.as_ref()))
            .filter_map(Value::as_number)
            .sum(),
    )
}

fn text_cells<'a>(
    view: &'a FilteredView<'a>,
    idx: usize,
) -> impl Iterator<Item = String> + 'a {
    view.iter_rows()
        .filter_map(move |row| row.get(idx).and_then(|cell| cell.as_ref()))
        .map(Value::as_display)
}

pub fn summarize(view: &FilteredView<'_>, mapping: &FieldMapping) -> MetricsSummary {
    let total_orders = view.len();
    let order_qty_total = sum_field(view, mapping, CanonicalField::OrderQty);
    let actual_delivery_total = sum_field(view, mapping, CanonicalField::ActualDelivery);

    let status = view
        .table()
        .field_index(mapping, CanonicalField::Status)
        .map(|idx| {
            let mut buckets = StatusBuckets::default();
            for value in text_cells(view, idx) {
                let lowered = value.to_ascii_lowercase();
                if lowered.contains(DELIVERED_TOKEN) {
                    buckets.delivered += 1;
                }
                if lowered.contains(PENDING_TOKEN) {
                    buckets.pending += 1;
                }
                if lowered.contains(CANCEL_TOKEN) {
                    buckets.cancelled += 1;
                }
            }
            buckets
        });

    let payment = view
        .table()
        .field_index(mapping, CanonicalField::PaymentType)
        .map(|idx| {
            let mut buckets = PaymentBuckets::default();
            for value in text_cells(view, idx) {
                let lowered = value.to_ascii_lowercase();
                if lowered.contains(CASH_TOKEN) {
                    buckets.cash += 1;
                }
                if lowered.contains(CREDIT_TOKEN) {
                    buckets.credit += 1;
                }
            }
            buckets
        });

    let delivery_ratio = match (order_qty_total, actual_delivery_total) {
        (Some(qty), Some(actual)) => Some(if qty == 0.0 { 0.0 } else { actual / qty }),
        _ => None,
    };
    let average_order_qty = order_qty_total.map(|qty| {
        if total_orders == 0 {
            0.0
        } else {
            qty / total_orders as f64
        }
    });

    MetricsSummary {
        total_orders,
        order_qty_total,
        actual_delivery_total,
        status,
        payment,
        delivery_ratio,
        average_order_qty,
    }
}

/// Accumulates (key, weight) pairs preserving first-seen key order, then
/// orders by descending weight with ties kept in first-seen order.
fn ranked_groups<W>(pairs: impl Iterator<Item = (String, W)>) -> Vec<(String, W)>
where
    W: Copy + PartialOrd + std::ops::AddAssign,
{
    let mut groups: Vec<(String, W)> = Vec::new();
    for (key, weight) in pairs {
        match groups.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, total)) => *total += weight,
            None => groups.push((key, weight)),
        }
    }
    groups.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    groups
}

/// Orders per raw status string, descending count, ties by first-seen
/// order in the view. `None` when Status is unmapped.
pub fn group_by_status(
    view: &FilteredView<'_>,
    mapping: &FieldMapping,
) -> Option<Vec<(String, usize)>> {
    let idx = view.table().field_index(mapping, CanonicalField::Status)?;
    Some(ranked_groups(text_cells(view, idx).map(|value| (value, 1))))
}

/// Payment type distribution for the pie chart; same ordering rule.
pub fn group_by_payment(
    view: &FilteredView<'_>,
    mapping: &FieldMapping,
) -> Option<Vec<(String, usize)>> {
    let idx = view
        .table()
        .field_index(mapping, CanonicalField::PaymentType)?;
    Some(ranked_groups(text_cells(view, idx).map(|value| (value, 1))))
}

/// Sum of OrderQty per plant; descending sum, ties by first-seen order.
/// `None` when either PlantName or OrderQty is unmapped.
pub fn group_by_plant(
    view: &FilteredView<'_>,
    mapping: &FieldMapping,
) -> Option<Vec<(String, f64)>> {
    let plant_idx = view.table().field_index(mapping, CanonicalField::PlantName)?;
    let qty_idx = view.table().field_index(mapping, CanonicalField::OrderQty)?;
    Some(ranked_groups(view.iter_rows().filter_map(|row| {
        let plant = row.get(plant_idx).and_then(|cell| cell.as_ref())?;
        let qty = row
            .get(qty_idx)
            .and_then(|cell| cell.as_ref())
            .and_then(Value::as_number)
            .unwrap_or(0.0);
        Some((plant.as_display(), qty))
    })))
}

/// Order counts by the calendar date portion of CreateDate, ascending.
/// Rows with a missing or unparseable CreateDate are skipped. `None` when
/// CreateDate is unmapped.
pub fn daily_order_trend(
    view: &FilteredView<'_>,
    mapping: &FieldMapping,
) -> Option<Vec<(NaiveDate, usize)>> {
    let idx = view
        .table()
        .field_index(mapping, CanonicalField::CreateDate)?;
    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for row in view.iter_rows() {
        let Some(date) = row
            .get(idx)
            .and_then(|cell| cell.as_ref())
            .and_then(Value::as_date)
        else {
            continue;
        };
        *counts.entry(date).or_insert(0) += 1;
    }
    Some(counts.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        filter::FilteredView,
        ingest::RawTable,
        schema::{self, FieldMapping},
        table::NormalizedTable,
    };
    use chrono::NaiveDate;

    fn dataset(rows: &[&[&str]]) -> (NormalizedTable, FieldMapping) {
        let raw = RawTable::from_rows(
            rows.iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect(),
        );
        let detection = schema::detect_header_row(
            &raw.rows,
            schema::HEADER_KEYWORDS,
            schema::HEADER_SCAN_ROWS,
        );
        let headers: Vec<String> = raw.rows[detection.row].clone();
        let mapping = schema::resolve_mapping(&headers);
        let table = NormalizedTable::build(&raw, detection, &mapping);
        (table, mapping)
    }

    #[test]
    fn summarize_counts_sums_and_buckets() {
        let (table, mapping) = dataset(&[
            &["Order ID", "Order Qty", "Actual Delivery", "Status", "Payment Type"],
            &["1", "10", "8", "Delivered", "Cash"],
            &["2", "NA", "0", "Pending", "Credit"],
            &["3", "5", "5", "Cancelled", "Cash"],
        ]);
        let view = FilteredView::all(&table);
        let summary = summarize(&view, &mapping);
        assert_eq!(summary.total_orders, 3);
        // "NA" is ignored rather than failing the sum.
        assert_eq!(summary.order_qty_total, Some(15.0));
        assert_eq!(summary.actual_delivery_total, Some(13.0));
        assert_eq!(
            summary.status,
            Some(StatusBuckets {
                delivered: 1,
                pending: 1,
                cancelled: 1
            })
        );
        assert_eq!(summary.payment, Some(PaymentBuckets { cash: 2, credit: 1 }));
        assert_eq!(summary.delivery_ratio, Some(13.0 / 15.0));
        assert_eq!(summary.average_order_qty, Some(5.0));
    }

    #[test]
    fn summarize_degrades_per_field_when_unmapped() {
        let (table, mapping) = dataset(&[
            &["Order ID", "Status"],
            &["1", "Delivered"],
        ]);
        let view = FilteredView::all(&table);
        let summary = summarize(&view, &mapping);
        assert_eq!(summary.total_orders, 1);
        assert_eq!(summary.order_qty_total, None);
        assert_eq!(summary.delivery_ratio, None);
        assert_eq!(summary.average_order_qty, None);
        assert_eq!(summary.payment, None);
        assert!(summary.status.is_some());
    }

    #[test]
    fn overlapping_status_text_counts_in_every_bucket() {
        let (table, mapping) = dataset(&[
            &["Order ID", "Status"],
            &["1", "Pending Cancellation"],
        ]);
        let view = FilteredView::all(&table);
        let buckets = summarize(&view, &mapping).status.unwrap();
        assert_eq!(buckets.pending, 1);
        assert_eq!(buckets.cancelled, 1);
        assert_eq!(buckets.delivered, 0);
    }

    #[test]
    fn empty_view_has_zero_ratios_not_nan() {
        let (table, mapping) = dataset(&[
            &["Order ID", "Order Qty", "Actual Delivery"],
        ]);
        let view = FilteredView::all(&table);
        let summary = summarize(&view, &mapping);
        assert_eq!(summary.order_qty_total, Some(0.0));
        assert_eq!(summary.delivery_ratio, Some(0.0));
        assert_eq!(summary.average_order_qty, Some(0.0));
    }

    #[test]
    fn group_by_status_orders_by_count_then_first_seen() {
        let (table, mapping) = dataset(&[
            &["Order ID", "Status"],
            &["1", "Delivered"],
            &["2", "Pending"],
            &["3", "On Booking"],
            &["4", "Delivered"],
        ]);
        let view = FilteredView::all(&table);
        assert_eq!(
            group_by_status(&view, &mapping),
            Some(vec![
                ("Delivered".to_string(), 2),
                ("Pending".to_string(), 1),
                ("On Booking".to_string(), 1),
            ])
        );
    }

    #[test]
    fn group_by_plant_sums_quantities() {
        let (table, mapping) = dataset(&[
            &["Plant Name", "Order Qty"],
            &["Manukan", "10"],
            &["Talisay", "30"],
            &["Manukan", "5"],
        ]);
        let view = FilteredView::all(&table);
        assert_eq!(
            group_by_plant(&view, &mapping),
            Some(vec![
                ("Talisay".to_string(), 30.0),
                ("Manukan".to_string(), 15.0),
            ])
        );
    }

    #[test]
    fn daily_trend_ascends_and_skips_missing_dates() {
        let (table, mapping) = dataset(&[
            &["Order ID", "CreateDate"],
            &["1", "2025-08-26"],
            &["2", "2025-08-25"],
            &["3", "garbage"],
            &["4", "2025-08-26 09:30:00"],
        ]);
        let view = FilteredView::all(&table);
        let day = |d| NaiveDate::from_ymd_opt(2025, 8, d).unwrap();
        assert_eq!(
            daily_order_trend(&view, &mapping),
            Some(vec![(day(25), 1), (day(26), 2)])
        );
    }

    #[test]
    fn group_bys_are_unavailable_without_their_columns() {
        let (table, mapping) = dataset(&[&["Order ID"], &["1"]]);
        let view = FilteredView::all(&table);
        assert_eq!(group_by_status(&view, &mapping), None);
        assert_eq!(group_by_plant(&view, &mapping), None);
        assert_eq!(daily_order_trend(&view, &mapping), None);
        assert_eq!(group_by_payment(&view, &mapping), None);
    }
}
