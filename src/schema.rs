//! Canonical schema resolution: header-row detection and column mapping.
//!
//! Uploaded order exports name and order their columns freely, and the
//! header row is not always the first row of the sheet. This module owns:
//!
//! - **Header detection**: a keyword-scoring scan over the leading rows,
//!   with the fallback decision surfaced in the returned [`HeaderDetection`]
//!   rather than hidden behind a default.
//! - **Column mapping**: [`resolve_mapping`] binds each [`CanonicalField`]
//!   to at most one actual column via a fixed candidate-name table; the
//!   mapping is injective and manual overrides always win.
//! - **Persistence**: mappings save and load as YAML so a hand-corrected
//!   mapping can be reapplied to the next upload of the same layout.

use std::{collections::BTreeMap, fmt, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// Keywords scored against candidate header rows.
pub const HEADER_KEYWORDS: &[&str] = &[
    "delivery", "plant", "order", "status", "date", "qty", "payment",
];

/// Rows scanned from the top of the sheet when locating the header.
pub const HEADER_SCAN_ROWS: usize = 10;

/// The fixed logical fields of an order/delivery dataset, independent of
/// how the source file names its columns.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum CanonicalField {
    OrderId,
    SiteNo,
    SiteName,
    CreateDate,
    DeliveryDate,
    PlantName,
    OrderQty,
    ActualDelivery,
    Status,
    PaymentType,
}

/// How cells under a canonical field are typed during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Text,
    Quantity,
    Date,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 10] = [
        CanonicalField::OrderId,
        CanonicalField::SiteNo,
        CanonicalField::SiteName,
        CanonicalField::CreateDate,
        CanonicalField::DeliveryDate,
        CanonicalField::PlantName,
        CanonicalField::OrderQty,
        CanonicalField::ActualDelivery,
        CanonicalField::Status,
        CanonicalField::PaymentType,
    ];

    pub fn role(self) -> FieldRole {
        match self {
            CanonicalField::CreateDate | CanonicalField::DeliveryDate => FieldRole::Date,
            CanonicalField::OrderQty | CanonicalField::ActualDelivery => FieldRole::Quantity,
            _ => FieldRole::Text,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            CanonicalField::OrderId => "Order ID",
            CanonicalField::SiteNo => "Site No",
            CanonicalField::SiteName => "Site Name",
            CanonicalField::CreateDate => "Create Date",
            CanonicalField::DeliveryDate => "Delivery Date",
            CanonicalField::PlantName => "Plant Name",
            CanonicalField::OrderQty => "Order Qty",
            CanonicalField::ActualDelivery => "Actual Delivery",
            CanonicalField::Status => "Status",
            CanonicalField::PaymentType => "Payment Type",
        }
    }

    /// Column-name candidates tried in priority order. Includes the
    /// Indonesian names the upstream order system exports.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            CanonicalField::OrderId => &["Order ID", "OrderID", "Order No", "Order Number"],
            CanonicalField::SiteNo => &["Site No", "SiteNo", "Site Number"],
            CanonicalField::SiteName => &["Site Name", "SiteName", "Nama Site"],
            CanonicalField::CreateDate => &[
                "CreateDate",
                "Create Date",
                "Created Date",
                "Order Date",
                "TanggalBuat",
                "Tanggal Buat",
            ],
            CanonicalField::DeliveryDate => &[
                "Delivery Date",
                "DeliveryDate",
                "Ship Date",
                "Tanggal Kirim",
            ],
            CanonicalField::PlantName => &["Plant Name", "PlantName", "Plant", "Nama Plant"],
            CanonicalField::OrderQty => &["Order Qty", "OrderQty", "Qty", "Quantity", "Jumlah"],
            CanonicalField::ActualDelivery => &[
                "Actual Delivery",
                "ActualDelivery",
                "Delivered Qty",
                "Actual Qty",
            ],
            CanonicalField::Status => &["Status", "Order Status"],
            CanonicalField::PaymentType => &[
                "Payment Type",
                "PaymentType",
                "Payment",
                "Tipe Pembayaran",
            ],
        }
    }

    /// Resolves a field from a caller-supplied name (display name, enum
    /// name, or any candidate alias), insensitive to case, spaces, and
    /// underscores.
    pub fn from_name(name: &str) -> Option<Self> {
        let key = normalize_column_name(name);
        if key.is_empty() {
            return None;
        }
        Self::ALL.into_iter().find(|field| {
            normalize_column_name(field.display_name()) == key
                || field
                    .candidates()
                    .iter()
                    .any(|candidate| normalize_column_name(candidate) == key)
        })
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Outcome of the header-row scan. `fallback` is true when no keyword
/// matched anywhere and row 0 was chosen by default, so callers and tests
/// can tell a confident detection from the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderDetection {
    pub row: usize,
    pub score: usize,
    pub fallback: bool,
}

/// Scans at most `max_rows_scanned` leading rows and scores each by the
/// number of `keywords` appearing case-insensitively as a substring of any
/// cell. Highest score wins; ties break to the lowest index. Zero matches
/// everywhere falls back to row 0.
pub fn detect_header_row(
    rows: &[Vec<String>],
    keywords: &[&str],
    max_rows_scanned: usize,
) -> HeaderDetection {
    let mut best_row = 0usize;
    let mut best_score = 0usize;
    for (idx, row) in rows.iter().take(max_rows_scanned).enumerate() {
        let lowered: Vec<String> = row.iter().map(|cell| cell.to_ascii_lowercase()).collect();
        let score = keywords
            .iter()
            .filter(|keyword| lowered.iter().any(|cell| cell.contains(*keyword)))
            .count();
        if score > best_score {
            best_row = idx;
            best_score = score;
        }
    }
    HeaderDetection {
        row: best_row,
        score: best_score,
        fallback: best_score == 0,
    }
}

/// Canonical key for column-name comparison: lowercased with spaces and
/// underscores stripped. Two names are equivalent iff their keys match.
pub fn normalize_column_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Returns the first actual column whose normalized key equals the key of
/// any candidate, trying candidates in the supplied priority order.
pub fn find_column<'a>(columns: &'a [String], candidates: &[&str]) -> Option<&'a str> {
    find_column_at(columns, candidates, &[]).map(|idx| columns[idx].as_str())
}

fn find_column_at(columns: &[String], candidates: &[&str], claimed: &[usize]) -> Option<usize> {
    let keys: Vec<String> = columns
        .iter()
        .map(|column| normalize_column_name(column))
        .collect();
    for candidate in candidates {
        let wanted = normalize_column_name(candidate);
        if wanted.is_empty() {
            continue;
        }
        let hit = keys
            .iter()
            .enumerate()
            .find(|(idx, key)| **key == wanted && !claimed.contains(idx));
        if let Some((idx, _)) = hit {
            return Some(idx);
        }
    }
    None
}

/// Binding of a canonical field to an actual column, with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "column", rename_all = "lowercase")]
pub enum FieldBinding {
    Unmapped,
    Auto(String),
    Manual(String),
}

impl FieldBinding {
    pub fn column(&self) -> Option<&str> {
        match self {
            FieldBinding::Unmapped => None,
            FieldBinding::Auto(column) | FieldBinding::Manual(column) => Some(column),
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, FieldBinding::Manual(_))
    }
}

/// Injective mapping from canonical fields to actual column names.
///
/// No two fields ever bind the same column: automatic resolution claims
/// columns in field-declaration order, and a manual assignment steals its
/// column from whichever field previously held it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    bindings: BTreeMap<CanonicalField, FieldBinding>,
}

impl FieldMapping {
    pub fn binding(&self, field: CanonicalField) -> &FieldBinding {
        static UNMAPPED: FieldBinding = FieldBinding::Unmapped;
        self.bindings.get(&field).unwrap_or(&UNMAPPED)
    }

    pub fn column(&self, field: CanonicalField) -> Option<&str> {
        self.binding(field).column()
    }

    pub fn is_mapped(&self, field: CanonicalField) -> bool {
        self.column(field).is_some()
    }

    /// Every canonical field with its current binding, in declaration order.
    pub fn entries(&self) -> Vec<(CanonicalField, FieldBinding)> {
        CanonicalField::ALL
            .into_iter()
            .map(|field| (field, self.binding(field).clone()))
            .collect()
    }

    fn bind(&mut self, field: CanonicalField, binding: FieldBinding) {
        match binding {
            FieldBinding::Unmapped => {
                self.bindings.remove(&field);
            }
            other => {
                self.bindings.insert(field, other);
            }
        }
    }

    /// Applies a user's manual choice for one field. `None` unmaps the
    /// field. Manual choices take precedence over auto-detection; a column
    /// already bound elsewhere is stolen and the displaced field reverts to
    /// unmapped, preserving injectivity.
    pub fn set_manual(&mut self, field: CanonicalField, column: Option<String>) {
        match column {
            None => self.bind(field, FieldBinding::Unmapped),
            Some(column) => {
                let displaced: Vec<CanonicalField> = self
                    .bindings
                    .iter()
                    .filter(|(other, binding)| {
                        **other != field && binding.column() == Some(column.as_str())
                    })
                    .map(|(other, _)| *other)
                    .collect();
                for other in displaced {
                    debug!("Column '{column}' reassigned from field '{other}'");
                    self.bindings.remove(&other);
                }
                self.bind(field, FieldBinding::Manual(column));
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating mapping file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing mapping YAML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening mapping file {path:?}"))?;
        let reader = BufReader::new(file);
        let mapping: FieldMapping =
            serde_yaml::from_reader(reader).context("Parsing mapping YAML")?;
        Ok(mapping)
    }
}

/// Resolves every canonical field against the actual columns using the
/// fixed candidate table. Fields with no surviving candidate stay unmapped;
/// a column claimed by an earlier field is skipped for later ones.
pub fn resolve_mapping(columns: &[String]) -> FieldMapping {
    let mut mapping = FieldMapping::default();
    let mut claimed: Vec<usize> = Vec::new();
    for field in CanonicalField::ALL {
        match find_column_at(columns, field.candidates(), &claimed) {
            Some(idx) => {
                debug!("Field '{field}' mapped to column '{}'", columns[idx]);
                claimed.push(idx);
                mapping.bind(field, FieldBinding::Auto(columns[idx].clone()));
            }
            None => debug!("Field '{field}' left unmapped"),
        }
    }
    mapping
}
