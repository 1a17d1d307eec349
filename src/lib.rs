//! # channel-digest
//!
//! Daily Slack channel metrics.
//!
//! ## Overview
//!
//! Once a day (or on `/dailyreport`) channel-digest walks the last 24 hours
//! of a channel's history, counts words, reactions and joins, upserts one row
//! per day into MySQL and posts a summary table back to the channel. It also
//! tags thread replies and reactions with a keyword sentiment label.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use channel_digest::{AppConfig, Gateway, store};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::resolve(None)?;
//!     let store = store::open_configured(&config.database).await;
//!     let gateway = Gateway::new(config, store)?;
//!     gateway.run(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//!     Ok(())
//! }
//! ```

pub mod types;
pub mod error;
pub mod channels;
pub mod report;
pub mod store;
pub mod sentiment;
pub mod gateway;
pub mod cli;

// Re-export commonly used types
pub use types::{
    AggregateResult,
    DailyReportRow,
    MessagePage,
    MessageRecord,
    MetricsWindow,
    ReportOutcome,
    Trigger,
};
pub use error::{Error, Result};
pub use gateway::{AppConfig, Gateway};
pub use report::ReportPipeline;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
