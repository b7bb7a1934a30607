// src/models/core.rs
use serde::{Deserialize, Serialize};

/// Dense id of a distinct weak-standardized name, `0..n` in sorted-name order.
pub type NameId = u32;

/// Canonical firm identifier handed to downstream panel construction.
pub type FirmNum = u64;

/// Source tags seen in the patent and financial tables.
pub mod source_tags {
    pub const APPLICATION: &str = "application";
    pub const GRANT: &str = "grant";
    pub const ASSIGNOR: &str = "assignor";
    pub const ASSIGNEE: &str = "assignee";
    pub const FINANCIAL_FILER: &str = "financial-filer";

    pub const KNOWN: [&str; 5] = [APPLICATION, GRANT, ASSIGNOR, ASSIGNEE, FINANCIAL_FILER];
}

/// One occurrence of an organization name in a source table.
///
/// `raw_name` is `None` when the source row had no usable name; such rows are
/// carried through to the output with a null firm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNameRecord {
    pub source_tag: String,
    pub record_id: String,
    pub raw_name: Option<String>,
}

impl RawNameRecord {
    pub fn new(
        source_tag: impl Into<String>,
        record_id: impl Into<String>,
        raw_name: impl Into<String>,
    ) -> Self {
        Self {
            source_tag: source_tag.into(),
            record_id: record_id.into(),
            raw_name: Some(raw_name.into()),
        }
    }

    pub fn without_name(source_tag: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self {
            source_tag: source_tag.into(),
            record_id: record_id.into(),
            raw_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniqueName {
    pub name_id: NameId,
    pub standardized_weak: String,
}
