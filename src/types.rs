//! Core types for channel-digest.
//!
//! These are the values that flow between the history source, the
//! aggregator, the report store and the notifier.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Seconds in the lookback window of a single run.
pub const LOOKBACK_SECS: i64 = 24 * 60 * 60;

/// The 24-hour lookback interval bounding one aggregation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsWindow {
    /// Slack channel ID
    pub channel_id: String,
    /// Lower bound (Unix seconds), passed to Slack as `oldest`
    pub oldest: i64,
    /// Wall-clock time the window was built at (Unix seconds)
    pub now: i64,
}

impl MetricsWindow {
    /// Build the window ending at `now`.
    pub fn ending_at(channel_id: &str, now: i64) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            oldest: now - LOOKBACK_SECS,
            now,
        }
    }
}

/// A reaction entry on a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub name: String,
    #[serde(default)]
    pub count: u64,
}

/// One message as returned by `conversations.history`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Slack's `type` field, `"message"` for ordinary messages.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub subtype: Option<String>,
}

impl MessageRecord {
    /// Create a plain message with the given text.
    pub fn message(text: &str) -> Self {
        Self {
            kind: "message".to_string(),
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    /// Create a `channel_join` system message.
    pub fn channel_join(user: &str) -> Self {
        Self {
            kind: "message".to_string(),
            text: Some(format!("<@{}> has joined the channel", user)),
            subtype: Some("channel_join".to_string()),
            ..Default::default()
        }
    }

    /// Attach a reaction.
    pub fn with_reaction(mut self, name: &str, count: u64) -> Self {
        self.reactions.push(Reaction {
            name: name.to_string(),
            count,
        });
        self
    }
}

/// One fetched batch of history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub messages: Vec<MessageRecord>,
    /// Cursor for the next page. Never `Some("")`.
    pub next_cursor: Option<String>,
}

impl MessagePage {
    /// Create a page, normalizing an empty cursor to `None`.
    pub fn new(messages: Vec<MessageRecord>, next_cursor: Option<String>) -> Self {
        Self {
            messages,
            next_cursor: next_cursor.filter(|c| !c.is_empty()),
        }
    }
}

/// Totals accumulated over a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub total_words: u64,
    pub total_reactions: u64,
    pub total_joins: u64,
    /// Channel membership at run time. Reported, never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_count: Option<u64>,
}

/// Persisted daily rollup, one per `report_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyReportRow {
    pub report_date: NaiveDate,
    pub people_joined: u64,
    pub total_reactions: u64,
    pub words_used: u64,
}

impl DailyReportRow {
    /// Build the row for `date` from a finished aggregate.
    pub fn from_totals(report_date: NaiveDate, totals: &AggregateResult) -> Self {
        Self {
            report_date,
            people_joined: totals.total_joins,
            total_reactions: totals.total_reactions,
            words_used: totals.total_words,
        }
    }
}

/// Basic channel metadata from `conversations.info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub name: Option<String>,
    pub member_count: u64,
}

/// What caused a report run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Cron tick
    Scheduled,
    /// Slash command or CLI
    OnDemand,
}

impl Trigger {
    /// Title used in the posted summary.
    pub fn title(&self) -> &'static str {
        match self {
            Trigger::Scheduled => "Daily Metrics Summary",
            Trigger::OnDemand => "Last 24 hours report (slash)",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Scheduled => "scheduled",
            Trigger::OnDemand => "on_demand",
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutcome {
    pub report_date: NaiveDate,
    pub totals: AggregateResult,
    /// False when the store rejected the row; the summary was still posted.
    pub stored: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_is_24_hours() {
        let window = MetricsWindow::ending_at("C1", 1_700_000_000);
        assert_eq!(window.now - window.oldest, 86_400);
        assert_eq!(window.channel_id, "C1");
    }

    #[test]
    fn test_message_record_from_slack_json() {
        let json = r#"{
            "type": "message",
            "user": "U1",
            "text": "hi there",
            "ts": "1700000000.000100",
            "reactions": [{"name": "+1", "users": ["U2"], "count": 5}]
        }"#;
        let record: MessageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind, "message");
        assert_eq!(record.text.as_deref(), Some("hi there"));
        assert_eq!(record.reactions[0].count, 5);
        assert!(record.subtype.is_none());
    }

    #[test]
    fn test_message_record_missing_fields() {
        let record: MessageRecord = serde_json::from_str(r#"{"subtype":"channel_join"}"#).unwrap();
        assert_eq!(record.kind, "");
        assert!(record.text.is_none());
        assert!(record.reactions.is_empty());
    }

    #[test]
    fn test_empty_cursor_is_absent() {
        let page = MessagePage::new(Vec::new(), Some(String::new()));
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_row_from_totals() {
        let date = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();
        let totals = AggregateResult {
            total_words: 6,
            total_reactions: 7,
            total_joins: 1,
            member_count: Some(40),
        };
        let row = DailyReportRow::from_totals(date, &totals);
        assert_eq!(row.words_used, 6);
        assert_eq!(row.total_reactions, 7);
        assert_eq!(row.people_joined, 1);
    }
}
