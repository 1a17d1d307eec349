//! Cron trigger for the daily report.

use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info, instrument};

use crate::error::SchedulerError;
use crate::report::ReportPipeline;

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct ReportSchedulerConfig {
    /// Six-field cron expression.
    pub cron_expression: String,
    /// Timezone the expression is evaluated in.
    pub timezone: Tz,
    /// Channel the scheduled report covers.
    pub channel_id: String,
    /// Timeout for starting and stopping the underlying scheduler.
    pub lifecycle_timeout: Duration,
}

impl ReportSchedulerConfig {
    pub fn new(cron_expression: &str, timezone: Tz, channel_id: &str) -> Self {
        Self {
            cron_expression: cron_expression.to_string(),
            timezone,
            channel_id: channel_id.to_string(),
            lifecycle_timeout: Duration::from_secs(5),
        }
    }
}

/// Runs [`ReportPipeline::run_scheduled`] on a cron schedule.
pub struct ReportScheduler {
    scheduler: Option<JobScheduler>,
    config: ReportSchedulerConfig,
    pipeline: Arc<ReportPipeline>,
}

impl ReportScheduler {
    pub fn new(config: ReportSchedulerConfig, pipeline: Arc<ReportPipeline>) -> Self {
        Self {
            scheduler: None,
            config,
            pipeline,
        }
    }

    pub fn config(&self) -> &ReportSchedulerConfig {
        &self.config
    }

    /// Returns true when a scheduler instance is active.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Register the report job and start ticking.
    #[instrument(skip(self), fields(cron = %self.config.cron_expression, tz = %self.config.timezone))]
    pub async fn start(&mut self) -> Result<(), SchedulerError> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let scheduler = self.build_scheduler().await?;
        let timeout = self.config.lifecycle_timeout;

        tokio::time::timeout(timeout, scheduler.start())
            .await
            .map_err(|_| SchedulerError::StartFailed(format!("timed out after {:?}", timeout)))?
            .map_err(|e| SchedulerError::StartFailed(e.to_string()))?;

        self.scheduler = Some(scheduler);
        info!(channel = %self.config.channel_id, "Report scheduler started");
        Ok(())
    }

    /// Stop ticking. A run already in progress is not interrupted.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<(), SchedulerError> {
        let mut scheduler = self.scheduler.take().ok_or(SchedulerError::NotRunning)?;
        let timeout = self.config.lifecycle_timeout;

        tokio::time::timeout(timeout, scheduler.shutdown())
            .await
            .map_err(|_| SchedulerError::StopFailed(format!("timed out after {:?}", timeout)))?
            .map_err(|e| SchedulerError::StopFailed(e.to_string()))?;

        info!("Report scheduler stopped");
        Ok(())
    }

    async fn build_scheduler(&self) -> Result<JobScheduler, SchedulerError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::CreationFailed(e.to_string()))?;

        let pipeline = self.pipeline.clone();
        let channel_id = self.config.channel_id.clone();

        let job = Job::new_async_tz(
            self.config.cron_expression.as_str(),
            self.config.timezone,
            move |_id, _lock| {
                let pipeline = pipeline.clone();
                let channel_id = channel_id.clone();
                Box::pin(async move {
                    pipeline.run_scheduled(&channel_id).await;
                })
            },
        )
        .map_err(|e| SchedulerError::JobRegistrationFailed(e.to_string()))?;

        let job_id = job.guid();
        scheduler
            .add(job)
            .await
            .map_err(|e| SchedulerError::JobRegistrationFailed(e.to_string()))?;

        debug!(job_id = %job_id, "Registered daily report job");
        Ok(scheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ChannelInfoSource, HistorySource, Notifier};
    use crate::error::ChannelError;
    use crate::report::PipelineOptions;
    use crate::store::MemoryReportStore;
    use crate::types::{ChannelInfo, MessagePage};
    use async_trait::async_trait;

    struct Quiet;

    #[async_trait]
    impl HistorySource for Quiet {
        async fn fetch_page(
            &self,
            _channel_id: &str,
            _oldest: i64,
            _limit: u32,
            _cursor: Option<&str>,
        ) -> Result<MessagePage, ChannelError> {
            Ok(MessagePage::default())
        }
    }

    #[async_trait]
    impl ChannelInfoSource for Quiet {
        async fn channel_info(&self, channel_id: &str) -> Result<ChannelInfo, ChannelError> {
            Ok(ChannelInfo {
                id: channel_id.to_string(),
                name: None,
                member_count: 0,
            })
        }
    }

    #[async_trait]
    impl Notifier for Quiet {
        async fn post_message(
            &self,
            _channel: &str,
            _text: &str,
            _blocks: Vec<serde_json::Value>,
        ) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    fn pipeline() -> Arc<ReportPipeline> {
        let quiet = Arc::new(Quiet);
        Arc::new(ReportPipeline::new(
            quiet.clone(),
            quiet.clone(),
            Arc::new(MemoryReportStore::new()),
            quiet,
            PipelineOptions::default(),
        ))
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let config = ReportSchedulerConfig::new("0 0 9 * * *", chrono_tz::Asia::Kolkata, "C1");
        let mut scheduler = ReportScheduler::new(config, pipeline());

        assert!(!scheduler.is_running());
        scheduler.start().await.unwrap();
        assert!(scheduler.is_running());
        assert!(matches!(scheduler.start().await, Err(SchedulerError::AlreadyRunning)));

        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running());
        assert!(matches!(scheduler.stop().await, Err(SchedulerError::NotRunning)));
    }

    #[tokio::test]
    async fn test_invalid_cron_rejected() {
        let config = ReportSchedulerConfig::new("every morning", Tz::UTC, "C1");
        let mut scheduler = ReportScheduler::new(config, pipeline());

        let err = scheduler.start().await.unwrap_err();
        assert!(matches!(err, SchedulerError::JobRegistrationFailed(_)));
        assert!(!scheduler.is_running());
    }
}
