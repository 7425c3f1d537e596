use std::path::PathBuf;

use thiserror::Error;

use crate::schema::CanonicalField;

/// Errors that cross the boundary to the presentation layer.
///
/// Per-cell data problems (unparseable dates or quantities) never surface
/// here; they become missing-value markers inside the table. Format errors
/// are fatal for the upload that produced them and leave any previous
/// session state untouched.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(
        "Unsupported input format for {path:?}: expected delimited text (.csv, .tsv, .txt) or a spreadsheet (.xls, .xlsx, .xlsm, .xlsb)"
    )]
    UnsupportedFormat { path: PathBuf },

    #[error("Canonical field '{field}' is not mapped to any source column")]
    MissingRequiredColumn { field: CanonicalField },

    #[error("Invalid filter configuration: {reason}")]
    InvalidFilterConfiguration { reason: String },
}

impl DashboardError {
    pub fn invalid_filter(reason: impl Into<String>) -> Self {
        DashboardError::InvalidFilterConfiguration {
            reason: reason.into(),
        }
    }
}
