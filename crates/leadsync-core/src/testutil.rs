//! In-memory gateway fakes for reconciler tests.

use crate::error::{Result, SyncError};
use crate::gateway::{CrmGateway, SheetGateway};
use crate::types::{ContactInfo, Deal, DealPatch, NewDeal, RowRecord, StageRef};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// FakeCrm
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeCrm {
    pub deals: Mutex<Vec<Deal>>,
    pub notes: Mutex<Vec<(i64, String)>>,
    pub fail_create: AtomicBool,
    pub fail_update: AtomicBool,
    next_id: AtomicI64,
}

impl FakeCrm {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(100),
            ..Self::default()
        }
    }

    pub fn with_deal(self, deal: Deal) -> Self {
        self.deals.lock().unwrap().push(deal);
        self
    }

    pub fn deal(&self, id: i64) -> Option<Deal> {
        self.deals.lock().unwrap().iter().find(|d| d.id == id).cloned()
    }
}

#[async_trait]
impl CrmGateway for FakeCrm {
    async fn get_deal(&self, id: i64) -> Result<Deal> {
        self.deal(id).ok_or(SyncError::DealNotFound(id))
    }

    async fn create_deal(&self, new: &NewDeal) -> Result<Deal> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(SyncError::transport("amocrm", "simulated create failure"));
        }
        let deal = Deal {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: new.name.clone(),
            price: new.price,
            status: StageRef {
                id: new.status_id,
                name: "New".into(),
            },
            contact: ContactInfo::default(),
        };
        self.deals.lock().unwrap().push(deal.clone());
        Ok(deal)
    }

    async fn update_deal(&self, id: i64, patch: &DealPatch) -> Result<Deal> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(SyncError::transport("amocrm", "simulated update failure"));
        }
        let mut deals = self.deals.lock().unwrap();
        let deal = deals
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(SyncError::DealNotFound(id))?;
        if let Some(name) = &patch.name {
            deal.name = name.clone();
        }
        if let Some(price) = patch.price {
            deal.price = price;
        }
        Ok(deal.clone())
    }

    async fn add_note(&self, id: i64, text: &str) -> Result<()> {
        if self.deal(id).is_none() {
            return Err(SyncError::DealNotFound(id));
        }
        self.notes.lock().unwrap().push((id, text.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeSheet
// ---------------------------------------------------------------------------

pub struct FakeSheet {
    pub identity_column: String,
    pub header_row: Mutex<Vec<String>>,
    pub rows: Mutex<Vec<RowRecord>>,
    /// Every write_cell call, in order: (row, column, value).
    pub writes: Mutex<Vec<(u32, String, String)>>,
}

impl FakeSheet {
    pub fn new(header: &[&str]) -> Self {
        Self {
            identity_column: "lead_id".to_string(),
            header_row: Mutex::new(header.iter().map(|s| s.to_string()).collect()),
            rows: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_row(self, row: RowRecord) -> Self {
        self.rows.lock().unwrap().push(row);
        self
    }

    pub fn cell(&self, row: u32, column: &str) -> Option<String> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.position == row)
            .and_then(|r| r.cells.get(column).cloned())
    }
}

#[async_trait]
impl SheetGateway for FakeSheet {
    async fn header(&self) -> Result<Vec<String>> {
        Ok(self.header_row.lock().unwrap().clone())
    }

    async fn all_rows(&self) -> Result<Vec<RowRecord>> {
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn find_row(&self, deal_id: i64) -> Result<Option<u32>> {
        if !self
            .header_row
            .lock()
            .unwrap()
            .iter()
            .any(|h| *h == self.identity_column)
        {
            return Err(SyncError::ColumnNotFound(self.identity_column.clone()));
        }
        let wanted = deal_id.to_string();
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.cell(&self.identity_column) == Some(wanted.as_str()))
            .map(|r| r.position))
    }

    async fn write_cell(&self, row: u32, column: &str, value: &str) -> Result<()> {
        if !self.header_row.lock().unwrap().iter().any(|h| h == column) {
            return Err(SyncError::ColumnNotFound(column.to_string()));
        }
        self.writes
            .lock()
            .unwrap()
            .push((row, column.to_string(), value.to_string()));
        let mut rows = self.rows.lock().unwrap();
        if let Some(record) = rows.iter_mut().find(|r| r.position == row) {
            record.cells.insert(column.to_string(), value.to_string());
        }
        Ok(())
    }
}
