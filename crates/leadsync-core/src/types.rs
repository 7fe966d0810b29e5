use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Deal — the CRM-owned entity, as consumed by this bridge
// ---------------------------------------------------------------------------

/// A pipeline stage reference: numeric id plus human-readable display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// A CRM deal as this bridge sees it. Only the attributes that flow into
/// spreadsheet cells are modeled; everything else stays with the vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    pub id: i64,
    pub name: String,
    pub price: i64,
    pub status: StageRef,
    #[serde(default)]
    pub contact: ContactInfo,
}

/// Fields for creating a deal. New deals always land in the pre-provisioned
/// pipeline stage configured for sheet-originated records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeal {
    pub name: String,
    pub price: i64,
    pub pipeline_id: i64,
    pub status_id: i64,
}

/// Partial update for an existing deal. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DealPatch {
    pub name: Option<String>,
    pub price: Option<i64>,
}

// ---------------------------------------------------------------------------
// RowRecord — one spreadsheet row keyed by column header
// ---------------------------------------------------------------------------

/// One data row of the sheet. `position` is the 1-based sheet row number
/// (row 1 is the header, so data rows start at 2).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowRecord {
    pub position: u32,
    pub cells: HashMap<String, String>,
}

impl RowRecord {
    pub fn new(position: u32) -> Self {
        Self {
            position,
            cells: HashMap::new(),
        }
    }

    pub fn with_cell(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.cells.insert(column.into(), value.into());
        self
    }

    /// Cell value for a column, treating missing and blank cells alike.
    pub fn cell(&self, column: &str) -> Option<&str> {
        self.cells
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}
