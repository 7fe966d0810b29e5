//! Periodic outbound sweep.
//!
//! Sweeps run inline in this task, so at most one sweep is ever in flight;
//! `MissedTickBehavior::Delay` pushes the next tick out instead of letting
//! ticks pile up behind a slow sweep. The first sweep fires immediately at
//! startup.

use leadsync_core::outbound::{OutboundReconciler, SweepOptions};
use leadsync_core::{CrmGateway, SheetGateway};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

pub async fn run(
    crm: Arc<dyn CrmGateway>,
    sheet: Arc<dyn SheetGateway>,
    opts: SweepOptions,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let reconciler = OutboundReconciler::new(&*crm, &*sheet, opts);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Separate handle so an in-flight sweep can observe shutdown between
    // rows, not just between ticks.
    let mut sweep_shutdown = shutdown.clone();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match reconciler.sweep_until(&mut sweep_shutdown).await {
                    Ok(report) => tracing::info!(
                        rows = report.rows,
                        created = report.created,
                        updated = report.updated,
                        failed = report.failed,
                        "scheduled sweep finished"
                    ),
                    // A failed sweep is retried wholesale on the next tick.
                    Err(e) => tracing::warn!(error = %e, "scheduled sweep aborted"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("shutdown requested, scheduler exiting");
                    break;
                }
            }
        }
    }
}
