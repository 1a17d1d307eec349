//! The report pipeline: aggregate, persist, notify.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use super::aggregator::{aggregate, DEFAULT_PAGE_SIZE};
use super::format::{failure_text, summary_message};
use super::inflight::{run_key, InFlightRegistry};
use crate::channels::{ChannelInfoSource, HistorySource, Notifier};
use crate::error::ReportError;
use crate::store::ReportStore;
use crate::types::{DailyReportRow, MetricsWindow, ReportOutcome, Trigger};

/// Tunables for a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// `limit` passed to `conversations.history`.
    pub page_size: u32,
    /// Upper bound on aggregate + persist + notify.
    pub run_timeout: Duration,
    /// Fetch and report the channel member count.
    pub include_member_count: bool,
    /// Timezone deciding the report's calendar date.
    pub timezone: Tz,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            run_timeout: Duration::from_secs(120),
            include_member_count: true,
            timezone: Tz::UTC,
        }
    }
}

/// Drives one report run at a time per channel and date.
pub struct ReportPipeline {
    history: Arc<dyn HistorySource>,
    channel_info: Arc<dyn ChannelInfoSource>,
    store: Arc<dyn ReportStore>,
    notifier: Arc<dyn Notifier>,
    options: PipelineOptions,
    in_flight: InFlightRegistry,
}

impl ReportPipeline {
    pub fn new(
        history: Arc<dyn HistorySource>,
        channel_info: Arc<dyn ChannelInfoSource>,
        store: Arc<dyn ReportStore>,
        notifier: Arc<dyn Notifier>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            history,
            channel_info,
            store,
            notifier,
            options,
            in_flight: InFlightRegistry::new(),
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<dyn ReportStore> {
        &self.store
    }

    pub fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    /// Run a report for `channel_id` ending now.
    pub async fn run(&self, channel_id: &str, trigger: Trigger) -> Result<ReportOutcome, ReportError> {
        self.run_at(channel_id, trigger, Utc::now()).await
    }

    /// Run a report for `channel_id` with the window ending at `now`.
    ///
    /// Storage failures are logged and reflected in `ReportOutcome::stored`;
    /// every other failure ends the run and is returned.
    ///
    /// The timeout also covers posting: if it fires mid-post, the row is
    /// already saved and no summary goes out.
    #[instrument(
        skip(self, trigger, now),
        fields(run_id = %uuid::Uuid::new_v4(), trigger = trigger.as_str())
    )]
    pub async fn run_at(
        &self,
        channel_id: &str,
        trigger: Trigger,
        now: DateTime<Utc>,
    ) -> Result<ReportOutcome, ReportError> {
        let report_date = now.with_timezone(&self.options.timezone).date_naive();
        let key = run_key(channel_id, report_date);

        let _guard = self
            .in_flight
            .try_acquire(&key)
            .ok_or_else(|| ReportError::RunInProgress { key: key.clone() })?;

        let timeout = self.options.run_timeout;
        match tokio::time::timeout(timeout, self.execute(channel_id, trigger, now, report_date)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(key = %key, timeout_secs = timeout.as_secs(), "Report run timed out");
                Err(ReportError::Timeout {
                    secs: timeout.as_secs(),
                })
            }
        }
    }

    async fn execute(
        &self,
        channel_id: &str,
        trigger: Trigger,
        now: DateTime<Utc>,
        report_date: chrono::NaiveDate,
    ) -> Result<ReportOutcome, ReportError> {
        let window = MetricsWindow::ending_at(channel_id, now.timestamp());
        let mut totals = aggregate(self.history.as_ref(), &window, self.options.page_size).await?;

        if self.options.include_member_count {
            let info = self
                .channel_info
                .channel_info(channel_id)
                .await
                .map_err(|e| ReportError::SourceUnavailable(e.to_string()))?;
            totals.member_count = Some(info.member_count);
        }

        let row = DailyReportRow::from_totals(report_date, &totals);
        let stored = match self.store.upsert(&row).await {
            Ok(outcome) => {
                info!(date = %report_date, store = self.store.name(), ?outcome, "Report saved");
                true
            }
            Err(e) => {
                let err = ReportError::StorageFailure(e.to_string());
                error!(date = %report_date, store = self.store.name(), error = %err, "Report not saved, posting anyway");
                false
            }
        };

        let message = summary_message(trigger.title(), report_date, &totals);
        self.notifier
            .post_message(channel_id, &message.text, message.blocks)
            .await
            .map_err(|e| ReportError::DeliveryFailure(e.to_string()))?;

        info!(date = %report_date, stored, "Report posted");
        Ok(ReportOutcome {
            report_date,
            totals,
            stored,
        })
    }

    /// Cron entry point. Never fails; every error is logged.
    pub async fn run_scheduled(&self, channel_id: &str) {
        info!(channel = channel_id, "Running scheduled report");
        match self.run(channel_id, Trigger::Scheduled).await {
            Ok(outcome) => info!(
                channel = channel_id,
                date = %outcome.report_date,
                stored = outcome.stored,
                "Scheduled report finished"
            ),
            Err(e) => error!(channel = channel_id, error = %e, "Scheduled report failed"),
        }
    }

    /// Slash-command / CLI entry point. The error is returned so the caller
    /// can tell the requester.
    pub async fn run_on_demand(&self, channel_id: &str) -> Result<ReportOutcome, ReportError> {
        let result = self.run(channel_id, Trigger::OnDemand).await;
        if let Err(e) = &result {
            warn!(channel = channel_id, error = %e, "On-demand report failed");
        }
        result
    }

    /// Tell `channel_id` that an on-demand run failed.
    pub async fn notify_failure(&self, channel_id: &str, err: &ReportError) {
        let text = failure_text(err.user_summary());
        if let Err(e) = self.notifier.post_message(channel_id, &text, Vec::new()).await {
            error!(channel = channel_id, error = %e, "Could not post failure notice");
        }
    }
}
