//! Gateway for channel-digest.
//!
//! The gateway wires configuration, the Slack client, the report store and
//! the pipeline together, then runs the HTTP server and the cron scheduler
//! until shutdown.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     Gateway                          │
//! │  ┌────────────┐  ┌────────────┐  ┌────────────┐      │
//! │  │   HTTP     │  │   Cron     │  │ Sentiment  │      │
//! │  │  server    │  │ scheduler  │  │  handler   │      │
//! │  └─────┬──────┘  └─────┬──────┘  └────────────┘      │
//! │        └───────┬───────┘                             │
//! │                ↓                                     │
//! │      ┌──────────────────┐                            │
//! │      │  ReportPipeline  │                            │
//! │      └──────────────────┘                            │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod scheduler;
pub mod server;
pub mod signature;

pub use config::{AppConfig, LoggingConfig, ReportConfig, ScheduleConfig, ServerConfig};
pub use scheduler::{ReportScheduler, ReportSchedulerConfig};
pub use server::{router, AppState, GatewayServer};
pub use signature::verify_slack_signature;

use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::channels::SlackClient;
use crate::error::Error;
use crate::report::ReportPipeline;
use crate::sentiment::SentimentHandler;
use crate::store::ReportStore;

/// The running service.
pub struct Gateway {
    config: AppConfig,
    pipeline: Arc<ReportPipeline>,
    sentiment: Arc<SentimentHandler>,
    store: Arc<dyn ReportStore>,
}

impl Gateway {
    /// Build the service from `config`, persisting into `store`.
    pub fn new(config: AppConfig, store: Arc<dyn ReportStore>) -> Result<Self, Error> {
        config.validate()?;

        let client = Arc::new(SlackClient::new(config.slack.clone())?);
        let pipeline = Arc::new(build_pipeline(&config, client.clone(), store.clone())?);
        let sentiment = Arc::new(SentimentHandler::new(
            client.clone(),
            client,
            config.slack.thread_summary_channel_id.clone(),
        ));

        Ok(Self {
            config,
            pipeline,
            sentiment,
            store,
        })
    }

    pub fn pipeline(&self) -> Arc<ReportPipeline> {
        self.pipeline.clone()
    }

    /// Serve HTTP and run the scheduler until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut scheduler = self.start_scheduler().await;

        let state = Arc::new(AppState::new(
            self.pipeline.clone(),
            self.sentiment.clone(),
            Some(self.config.slack.signing_secret.clone()),
        ));
        let server = GatewayServer::new(state, &self.config.server.host, self.config.server.port);
        let served = server.serve(shutdown).await;

        if let Some(scheduler) = scheduler.as_mut() {
            if let Err(e) = scheduler.stop().await {
                warn!(error = %e, "Scheduler did not stop cleanly");
            }
        }
        self.store.close().await;
        info!("Gateway stopped");

        served.map_err(Error::from)
    }

    async fn start_scheduler(&self) -> Option<ReportScheduler> {
        if !self.config.schedule.enabled {
            info!("Scheduled reports disabled");
            return None;
        }

        let Some(channel) = self.config.report_channel() else {
            error!("REPORT_CHANNEL_ID is not set; scheduled reports are disabled");
            return None;
        };

        let timezone = self.pipeline.options().timezone;
        let config = ReportSchedulerConfig::new(&self.config.schedule.cron, timezone, channel);
        let mut scheduler = ReportScheduler::new(config, self.pipeline.clone());

        match scheduler.start().await {
            Ok(()) => Some(scheduler),
            Err(e) => {
                error!(error = %e, "Could not start report scheduler");
                None
            }
        }
    }
}

/// Build a pipeline that reads from and posts through `client`.
pub fn build_pipeline(
    config: &AppConfig,
    client: Arc<SlackClient>,
    store: Arc<dyn ReportStore>,
) -> Result<ReportPipeline, Error> {
    Ok(ReportPipeline::new(
        client.clone(),
        client.clone(),
        store,
        client,
        config.pipeline_options()?,
    ))
}
