//! Single consumer for the inbound notification queue.
//!
//! Notifications are processed strictly one at a time, in queue order, which
//! preserves "no concurrent mutation of one row" without any locking. A
//! notification being processed when shutdown is requested runs to
//! completion; the queue is only checked between items.

use leadsync_core::inbound::InboundReconciler;
use leadsync_core::mapping::FieldMap;
use leadsync_core::{CrmGateway, SheetGateway};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

pub async fn run(
    mut queue: mpsc::Receiver<Value>,
    crm: Arc<dyn CrmGateway>,
    sheet: Arc<dyn SheetGateway>,
    columns: FieldMap,
    mut shutdown: watch::Receiver<bool>,
) {
    let reconciler = InboundReconciler::new(&*crm, &*sheet, &columns);
    loop {
        tokio::select! {
            payload = queue.recv() => {
                let Some(payload) = payload else {
                    tracing::info!("inbound queue closed, worker exiting");
                    break;
                };
                for outcome in reconciler.process_payload(&payload).await {
                    tracing::debug!(?outcome, "notification processed");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("shutdown requested, worker exiting");
                    break;
                }
            }
        }
    }
}
