//! HTTP surface and background tasks for the deal-sync bridge.
//!
//! Inbound: the webhook handler normalizes a notification and enqueues it;
//! a single worker task reconciles CRM -> sheet off the request path.
//! Outbound: a scheduler task sweeps the sheet -> CRM on a fixed interval.

pub mod error;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod worker;

use amocrm_client::AmoCrmClient;
use axum::routing::{get, post};
use axum::Router;
use gsheets_client::SheetsClient;
use leadsync_core::outbound::SweepOptions;
use leadsync_core::{Config, CrmGateway, SheetGateway};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

const QUEUE_DEPTH: usize = 256;

/// Build the axum Router with all routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: state::AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::health::root))
        .route("/webhook/amocrm", post(routes::webhook::amocrm_webhook))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Run the bridge: webhook server, inbound worker, and sweep scheduler.
/// Returns when the process is asked to stop and both background tasks have
/// finished their current item.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let crm: Arc<dyn CrmGateway> = Arc::new(AmoCrmClient::new(&config.amocrm)?);
    let sheet: Arc<dyn SheetGateway> = Arc::new(SheetsClient::new(&config.sheets)?);

    let (queue_tx, queue_rx) = mpsc::channel(QUEUE_DEPTH);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = tokio::spawn(worker::run(
        queue_rx,
        crm.clone(),
        sheet.clone(),
        config.sync.columns.clone(),
        shutdown_rx.clone(),
    ));
    let scheduler = tokio::spawn(scheduler::run(
        crm,
        sheet,
        SweepOptions::from_config(&config),
        Duration::from_secs(config.sync.sweep_interval_secs),
        shutdown_rx,
    ));

    let app = build_router(state::AppState::new(queue_tx));
    let addr = format!("0.0.0.0:{}", config.sync.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("bridge listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let each task finish its in-flight item, then wait for both.
    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(worker, scheduler);
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown requested");
}
