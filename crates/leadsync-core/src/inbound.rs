//! Inbound reconciliation: CRM -> sheet, one notification at a time.
//!
//! State machine per event: Received -> Identified -> Fetched -> Applied,
//! with any step allowed to terminate as Skipped. A notification is only a
//! trigger; the deal is always re-fetched from the CRM before anything is
//! written, so out-of-order delivery cannot apply stale data.

use crate::gateway::{CrmGateway, SheetGateway};
use crate::mapping::{map_deal_to_columns, FieldMap};
use crate::webhook::{self, RawEvent};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Payload carried no deal update/create envelope.
    UnhandledEvent,
    /// Event entry had a missing or malformed deal id.
    MissingDealId,
    /// No row holds this deal id — the deal is not under our management.
    NoLinkedRow,
    /// The deal could not be re-fetched this cycle.
    DealUnavailable,
    /// The sheet could not be read this cycle.
    SheetUnavailable,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnhandledEvent => "unhandled event",
            Self::MissingDealId => "missing deal id",
            Self::NoLinkedRow => "no linked row",
            Self::DealUnavailable => "deal unavailable",
            Self::SheetUnavailable => "sheet unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Cells were written to the linked row. `written` counts the columns
    /// that actually landed (columns absent from the live header are
    /// per-field skips, not failures).
    Applied { row: u32, written: usize },
    Skipped(SkipReason),
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct InboundReconciler<'a> {
    crm: &'a dyn CrmGateway,
    sheet: &'a dyn SheetGateway,
    columns: &'a FieldMap,
}

impl<'a> InboundReconciler<'a> {
    pub fn new(
        crm: &'a dyn CrmGateway,
        sheet: &'a dyn SheetGateway,
        columns: &'a FieldMap,
    ) -> Self {
        Self {
            crm,
            sheet,
            columns,
        }
    }

    /// Process one normalized webhook payload. A payload may carry several
    /// deal events; each gets its own outcome. Per-event failures are logged
    /// and skipped, never propagated to the webhook caller.
    pub async fn process_payload(&self, payload: &Value) -> Vec<InboundOutcome> {
        let events = webhook::extract_events(payload);
        if events.is_empty() {
            tracing::info!("webhook carried no deal events, skipping");
            return vec![InboundOutcome::Skipped(SkipReason::UnhandledEvent)];
        }
        let mut outcomes = Vec::with_capacity(events.len());
        for event in &events {
            outcomes.push(self.process_event(event).await);
        }
        outcomes
    }

    /// Run the state machine for a single event.
    pub async fn process_event(&self, event: &RawEvent) -> InboundOutcome {
        // Received -> Identified
        let Some(deal_id) = event.deal_id else {
            tracing::warn!(kind = event.kind.as_str(), "event without a usable deal id");
            return InboundOutcome::Skipped(SkipReason::MissingDealId);
        };

        // Identified -> Fetched: locate the row first; a deal with no linked
        // row is left alone (no implicit adoption).
        let row = match self.sheet.find_row(deal_id).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                tracing::info!(deal_id, "no row linked to deal, skipping");
                return InboundOutcome::Skipped(SkipReason::NoLinkedRow);
            }
            Err(e) => {
                tracing::warn!(deal_id, error = %e, "row lookup failed");
                return InboundOutcome::Skipped(SkipReason::SheetUnavailable);
            }
        };

        // Re-fetch authoritative state; the payload may be partial or stale.
        let deal = match self.crm.get_deal(deal_id).await {
            Ok(deal) => deal,
            Err(e) => {
                tracing::warn!(deal_id, error = %e, "deal re-fetch failed");
                return InboundOutcome::Skipped(SkipReason::DealUnavailable);
            }
        };

        // Fetched -> Applied: resolve every target column against the live
        // header, then write unconditionally (idempotent full overwrite).
        let header = match self.sheet.header().await {
            Ok(header) => header,
            Err(e) => {
                tracing::warn!(deal_id, error = %e, "header read failed");
                return InboundOutcome::Skipped(SkipReason::SheetUnavailable);
            }
        };

        let mut written = 0;
        for (column, value) in map_deal_to_columns(&deal, self.columns) {
            if !header.iter().any(|h| *h == column) {
                tracing::warn!(deal_id, column, "column missing from header, field skipped");
                continue;
            }
            match self.sheet.write_cell(row, &column, &value).await {
                Ok(()) => written += 1,
                Err(e) => {
                    tracing::warn!(deal_id, column, error = %e, "cell write failed");
                }
            }
        }

        tracing::info!(deal_id, row, written, "inbound reconciliation applied");
        InboundOutcome::Applied { row, written }
    }
}
