//! In-memory analytics core for an order & delivery dashboard.
//!
//! The crate turns an uploaded tabular export (CSV or spreadsheet) into
//! the values a browser presentation layer renders: a normalized table, a
//! canonical column mapping, filtered views, summary metrics, and
//! chart-ready aggregates. The pipeline for one interaction is:
//!
//! 1. [`ingest`] reads the file into an immutable raw cell grid;
//! 2. [`schema`] finds the header row and maps arbitrarily named columns
//!    onto the canonical order fields;
//! 3. [`table`] applies the header and types the cells;
//! 4. [`filter`] computes the view satisfying the user's selections;
//! 5. [`metrics`] derives the summary and chart aggregates;
//! 6. [`session`] holds it all as a single value replaced wholesale per
//!    interaction, and [`export`] writes the filtered view back out as
//!    CSV.
//!
//! The crate never renders anything and never calls back into the
//! presentation layer; it only returns values.

pub mod data;
pub mod error;
pub mod export;
pub mod filter;
pub mod ingest;
pub mod io_utils;
pub mod metrics;
pub mod schema;
pub mod session;
pub mod table;
