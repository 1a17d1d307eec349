//! Daily report persistence.
//!
//! The pipeline owns an `Arc<dyn ReportStore>` handed to it at construction.
//! Implementations:
//!
//! | Store                 | Backing           | Used by                        |
//! |-----------------------|-------------------|--------------------------------|
//! | `MySqlReportStore`    | MySQL via sqlx    | `serve`, `run`                 |
//! | `MemoryReportStore`   | in-process map    | `run --no-db`, tests           |
//! | `DisabledReportStore` | nothing           | database not configured        |

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

use crate::error::StoreError;
use crate::types::DailyReportRow;

pub mod memory;
pub mod mysql;

pub use memory::MemoryReportStore;
pub use mysql::{DatabaseConfig, MySqlReportStore};

/// What an upsert did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No row existed for the date.
    Inserted,
    /// The existing row's counters were overwritten.
    Updated,
    /// The existing row already held these counters.
    Unchanged,
}

/// Insert-or-overwrite storage of [`DailyReportRow`]s keyed by date.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Insert the row, or overwrite all three counters of the row with the
    /// same `report_date`. Counters are replaced, never summed.
    async fn upsert(&self, row: &DailyReportRow) -> Result<UpsertOutcome, StoreError>;

    /// Row stored for `date`, if any.
    async fn get(&self, date: NaiveDate) -> Result<Option<DailyReportRow>, StoreError>;

    /// Release connections. Further calls fail.
    async fn close(&self);

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Store used when no database is configured. Every write fails with
/// [`StoreError::NotConfigured`], which the pipeline logs and moves past.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledReportStore;

#[async_trait]
impl ReportStore for DisabledReportStore {
    async fn upsert(&self, _row: &DailyReportRow) -> Result<UpsertOutcome, StoreError> {
        Err(StoreError::NotConfigured)
    }

    async fn get(&self, _date: NaiveDate) -> Result<Option<DailyReportRow>, StoreError> {
        Err(StoreError::NotConfigured)
    }

    async fn close(&self) {}

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Open the MySQL store when `config` is complete and reachable. Otherwise
/// log why and fall back to [`DisabledReportStore`] so reports still post.
pub async fn open_configured(config: &DatabaseConfig) -> Arc<dyn ReportStore> {
    let missing = config.missing_fields();
    if !missing.is_empty() {
        tracing::warn!(missing = ?missing, "Database not configured; reports will not be saved");
        return Arc::new(DisabledReportStore);
    }

    match MySqlReportStore::open(config).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(error = %e, "Could not open report database; reports will not be saved");
            Arc::new(DisabledReportStore)
        }
    }
}
