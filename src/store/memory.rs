//! In-process report store.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{ReportStore, UpsertOutcome};
use crate::error::StoreError;
use crate::types::DailyReportRow;

/// Rows kept in a map keyed by date, with the same last-write-wins
/// semantics as the MySQL table.
#[derive(Debug, Clone, Default)]
pub struct MemoryReportStore {
    rows: Arc<RwLock<BTreeMap<NaiveDate, DailyReportRow>>>,
    closed: Arc<AtomicBool>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows, oldest date first.
    pub async fn rows(&self) -> Vec<DailyReportRow> {
        self.rows.read().await.values().copied().collect()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Connect("store is closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn upsert(&self, row: &DailyReportRow) -> Result<UpsertOutcome, StoreError> {
        self.ensure_open()?;

        let mut rows = self.rows.write().await;
        let outcome = match rows.insert(row.report_date, *row) {
            None => UpsertOutcome::Inserted,
            Some(previous) if previous == *row => UpsertOutcome::Unchanged,
            Some(_) => UpsertOutcome::Updated,
        };
        Ok(outcome)
    }

    async fn get(&self, date: NaiveDate) -> Result<Option<DailyReportRow>, StoreError> {
        self.ensure_open()?;
        Ok(self.rows.read().await.get(&date).copied())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(joined: u64, reactions: u64, words: u64) -> DailyReportRow {
        DailyReportRow {
            report_date: NaiveDate::from_ymd_opt(2025, 11, 20).unwrap(),
            people_joined: joined,
            total_reactions: reactions,
            words_used: words,
        }
    }

    #[tokio::test]
    async fn test_upsert_same_date_overwrites() {
        let store = MemoryReportStore::new();

        assert_eq!(store.upsert(&row(1, 2, 3)).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert(&row(4, 5, 6)).await.unwrap(), UpsertOutcome::Updated);

        let rows = store.rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], row(4, 5, 6));
    }

    #[tokio::test]
    async fn test_upsert_identical_is_unchanged() {
        let store = MemoryReportStore::new();
        store.upsert(&row(1, 1, 1)).await.unwrap();
        assert_eq!(store.upsert(&row(1, 1, 1)).await.unwrap(), UpsertOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_closed_store_fails() {
        let store = MemoryReportStore::new();
        store.close().await;
        assert!(store.upsert(&row(1, 1, 1)).await.is_err());
    }
}
