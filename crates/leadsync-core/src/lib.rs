//! Domain model and reconciliation logic for the amoCRM <-> Google Sheets
//! bridge. No HTTP lives here: the vendor APIs sit behind the two gateway
//! traits, and both reconcilers are written against those traits so the
//! logic is testable with in-memory fakes.

pub mod config;
pub mod error;
pub mod gateway;
pub mod inbound;
pub mod mapping;
pub mod outbound;
pub mod types;
pub mod webhook;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::Config;
pub use error::{Result, SyncError};
pub use gateway::{CrmGateway, SheetGateway};
pub use inbound::{InboundOutcome, InboundReconciler, SkipReason};
pub use outbound::{OutboundReconciler, SweepOptions, SweepReport};
pub use types::{ContactInfo, Deal, DealPatch, NewDeal, RowRecord, StageRef};
