//! Helpers for the command-line interface.

use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::gateway::LoggingConfig;
use crate::types::ReportOutcome;

/// Expand tilde (~) in paths.
pub fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins; otherwise `debug` with `verbose`, else the configured level.
pub fn init_logging(config: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Human-readable summary of a finished run.
pub fn describe_outcome(channel: &str, outcome: &ReportOutcome) -> String {
    let mut lines = vec![
        format!("Report for {} on {}", channel, outcome.report_date),
        format!("  Words used:      {}", outcome.totals.total_words),
        format!("  Total reactions: {}", outcome.totals.total_reactions),
        format!("  People joined:   {}", outcome.totals.total_joins),
    ];
    if let Some(members) = outcome.totals.member_count {
        lines.push(format!("  Channel members: {}", members));
    }
    lines.push(format!(
        "  Saved:           {}",
        if outcome.stored { "yes" } else { "no" }
    ));
    lines.join("\n")
}
