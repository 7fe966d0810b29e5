use crate::error::Result;
use crate::types::{Deal, DealPatch, NewDeal, RowRecord};
use async_trait::async_trait;

/// Typed operations against the CRM's deal-management API.
///
/// Each call is one logical round trip. Failures come back as typed errors;
/// callers treat a failed call as "this item was not synced this cycle" and
/// move on rather than aborting the surrounding batch.
#[async_trait]
pub trait CrmGateway: Send + Sync {
    async fn get_deal(&self, id: i64) -> Result<Deal>;
    async fn create_deal(&self, deal: &NewDeal) -> Result<Deal>;
    async fn update_deal(&self, id: i64, patch: &DealPatch) -> Result<Deal>;
    async fn add_note(&self, id: i64, text: &str) -> Result<()>;
}

/// Typed operations against the spreadsheet.
///
/// Columns are always resolved by name against the current header row, never
/// by fixed index — header layout may shift between calls.
#[async_trait]
pub trait SheetGateway: Send + Sync {
    /// The header row, in sheet order.
    async fn header(&self) -> Result<Vec<String>>;

    /// All data rows, keyed by column name, in sheet order.
    async fn all_rows(&self) -> Result<Vec<RowRecord>>;

    /// 1-based row position whose identity cell exactly matches the
    /// stringified deal id, scanning top to bottom. O(rows) per lookup,
    /// which is fine at sheet scale.
    async fn find_row(&self, deal_id: i64) -> Result<Option<u32>>;

    /// Unconditionally set one cell, addressing the column by name.
    async fn write_cell(&self, row: u32, column: &str, value: &str) -> Result<()>;
}
