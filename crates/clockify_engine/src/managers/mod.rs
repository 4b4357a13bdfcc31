//! Resource managers: cached listings, lookups and mutations per resource.
//!
//! Every manager owns one cache. A listing is cached and exported only when it
//! ran to completion; any create, update or delete drops the cache whether or
//! not the call succeeded.

mod client;
mod expense;
mod group;
mod project;
mod task;
mod user;

pub use client::ClientManager;
pub use expense::{BulkOutcome, ExpenseFilter, ExpenseManager, FailedExpense, MAX_EXPENSE_PAGE_SIZE};
pub use group::GroupManager;
pub use project::{ProjectManager, WorkspaceStructure};
pub use task::TaskManager;
pub use user::UserManager;

use clockify_core::{Aggregate, Resource};
use clockify_logging::clk_warn;
use serde::Serialize;
use serde_json::Value;

use crate::export::{export_dataset, ExportSink};
use crate::{ApiError, FailureKind};

/// Exports a finished listing and reports whether it may be cached.
pub(crate) fn settle_listing<R: Serialize>(
    aggregate: &Aggregate<R>,
    sink: &dyn ExportSink,
    export_name: &str,
) -> bool {
    if !aggregate.is_complete() {
        clk_warn!(
            "{export_name}: listing incomplete after {} pages ({}); not cached",
            aggregate.pages_fetched,
            aggregate.stop
        );
        return false;
    }
    if !aggregate.items.is_empty() {
        export_dataset(sink, export_name, &aggregate.items);
    }
    true
}

pub(crate) fn decode<R: Resource>(value: Value) -> Result<R, ApiError> {
    clockify_core::decode_record(value)
        .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
}
