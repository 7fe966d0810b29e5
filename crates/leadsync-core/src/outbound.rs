//! Outbound reconciliation: sheet -> CRM, one full sweep per invocation.
//!
//! Every row is independently idempotent: a row that fails this sweep is
//! simply picked up again by the next one. Nothing here aborts the batch.

use crate::config::Config;
use crate::error::Result;
use crate::gateway::{CrmGateway, SheetGateway};
use crate::mapping::FieldMap;
use crate::types::{DealPatch, NewDeal, RowRecord};
use std::time::Duration;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Options & report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SweepOptions {
    pub columns: FieldMap,
    /// Header of the column holding the linked deal id.
    pub identity_column: String,
    /// Pipeline/stage newly created deals are provisioned into.
    pub new_deal_pipeline: i64,
    pub new_deal_status: i64,
    /// Pause between rows; CRM rate-limit courtesy, zero disables it.
    pub row_delay: Duration,
}

impl SweepOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            columns: config.sync.columns.clone(),
            identity_column: config.sheets.identity_column.clone(),
            new_deal_pipeline: config.amocrm.pipeline_id,
            new_deal_status: config.amocrm.status_id,
            row_delay: Duration::from_millis(config.sync.row_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub rows: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowAction {
    Created(i64),
    Updated(i64),
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct OutboundReconciler<'a> {
    crm: &'a dyn CrmGateway,
    sheet: &'a dyn SheetGateway,
    opts: SweepOptions,
}

impl<'a> OutboundReconciler<'a> {
    pub fn new(crm: &'a dyn CrmGateway, sheet: &'a dyn SheetGateway, opts: SweepOptions) -> Self {
        Self { crm, sheet, opts }
    }

    /// One full pass over the sheet. Only a failure to read the rows at all
    /// aborts the sweep; per-row failures are logged, counted, and skipped.
    pub async fn sweep(&self) -> Result<SweepReport> {
        // Manual sweeps run to completion; the sender stays alive so the
        // receiver never fires.
        let (_stay_open, mut never) = watch::channel(false);
        self.sweep_until(&mut never).await
    }

    /// Like [`Self::sweep`], but stops between rows once `shutdown` flips to
    /// true. The row in flight finishes its vendor call first; unprocessed
    /// rows are picked up by the next sweep.
    pub async fn sweep_until(&self, shutdown: &mut watch::Receiver<bool>) -> Result<SweepReport> {
        let rows = self.sheet.all_rows().await?;
        let mut report = SweepReport {
            rows: rows.len(),
            ..SweepReport::default()
        };
        tracing::info!(rows = rows.len(), "outbound sweep started");

        for row in &rows {
            if *shutdown.borrow() {
                tracing::info!("shutdown requested, sweep stopping early");
                break;
            }
            match self.sync_row(row).await {
                Ok(RowAction::Created(deal_id)) => {
                    tracing::info!(row = row.position, deal_id, "created deal for row");
                    report.created += 1;
                }
                Ok(RowAction::Updated(deal_id)) => {
                    tracing::info!(row = row.position, deal_id, "updated deal from row");
                    report.updated += 1;
                }
                Err(e) => {
                    tracing::warn!(row = row.position, error = %e, "row left for next sweep");
                    report.failed += 1;
                }
            }
            if !self.opts.row_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.opts.row_delay) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }

        tracing::info!(
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            "outbound sweep finished"
        );
        Ok(report)
    }

    async fn sync_row(&self, row: &RowRecord) -> Result<RowAction> {
        let columns = &self.opts.columns;
        let name = row.cell(&columns.name).unwrap_or("N/A").to_string();
        // Non-numeric amounts coerce to 0 — a bad cell never fails the row.
        let price = row
            .cell(&columns.price)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);

        match row.cell(&self.opts.identity_column) {
            Some(raw_id) => {
                let deal_id = raw_id.parse::<i64>().map_err(|_| {
                    crate::error::SyncError::MalformedPayload(format!(
                        "row {} identity cell is not a deal id: '{raw_id}'",
                        row.position
                    ))
                })?;
                let patch = DealPatch {
                    name: Some(format!("Deal for {name}")),
                    price: Some(price),
                };
                self.crm.update_deal(deal_id, &patch).await?;
                if let Err(e) = self.crm.add_note(deal_id, &contact_note(row, columns, true)).await {
                    tracing::warn!(deal_id, error = %e, "update note failed");
                }
                Ok(RowAction::Updated(deal_id))
            }
            None => {
                let new_deal = NewDeal {
                    name: format!("Deal for {name}"),
                    price,
                    pipeline_id: self.opts.new_deal_pipeline,
                    status_id: self.opts.new_deal_status,
                };
                // Create failure leaves the identity cell empty; the next
                // sweep retries the row.
                let deal = self.crm.create_deal(&new_deal).await?;
                if let Err(e) = self
                    .crm
                    .add_note(deal.id, &contact_note(row, columns, false))
                    .await
                {
                    tracing::warn!(deal_id = deal.id, error = %e, "contact note failed");
                }
                self.sheet
                    .write_cell(row.position, &self.opts.identity_column, &deal.id.to_string())
                    .await?;
                Ok(RowAction::Created(deal.id))
            }
        }
    }
}

/// Note text carrying the row's contact data into the CRM.
fn contact_note(row: &RowRecord, columns: &FieldMap, is_update: bool) -> String {
    let header = if is_update {
        "Updated contact details:"
    } else {
        "Contact details from the sheet:"
    };
    format!(
        "{header}\nPhone: {}\nEmail: {}",
        row.cell(&columns.phone).unwrap_or("not provided"),
        row.cell(&columns.email).unwrap_or("not provided"),
    )
}
