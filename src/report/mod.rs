//! Daily metrics reporting.
//!
//! A run walks the last 24 hours of a channel's history, folds it into
//! totals, upserts the day's row and posts a summary back to the channel.
//!
//! ```text
//! trigger ──▶ ReportPipeline ──▶ aggregator ──▶ ReportStore ──▶ Notifier
//!               (in-flight key,    (cursor       (upsert,        (chat.postMessage)
//!                timeout)           pagination)   best effort)
//! ```

pub mod aggregator;
pub mod format;
pub mod inflight;
pub mod pipeline;

pub use aggregator::{aggregate, count_words, DEFAULT_PAGE_SIZE};
pub use format::{display_date, failure_text, summary_message, SummaryMessage};
pub use inflight::{run_key, InFlightGuard, InFlightRegistry};
pub use pipeline::{PipelineOptions, ReportPipeline};
