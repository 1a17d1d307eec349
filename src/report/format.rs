//! Block Kit rendering of the daily summary.

use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::types::AggregateResult;

/// Column headers of the summary table, left to right.
pub const TABLE_HEADERS: [&str; 4] = ["Date", "Total Reactions", "People Joined", "Words Used"];

/// Column alignment of the summary table, matching [`TABLE_HEADERS`].
pub const TABLE_ALIGNMENT: [&str; 4] = ["left", "center", "center", "right"];

/// A rendered message: notification fallback text plus blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryMessage {
    pub text: String,
    pub blocks: Vec<Value>,
}

/// Date as shown to people, e.g. `Nov 20, 2025`.
pub fn display_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// Render the summary for `date`.
pub fn summary_message(title: &str, date: NaiveDate, totals: &AggregateResult) -> SummaryMessage {
    let shown = display_date(date);

    let header_row: Vec<Value> = TABLE_HEADERS.iter().map(|h| raw_text(h)).collect();
    let data_row = vec![
        raw_text(&shown),
        raw_text(&totals.total_reactions.to_string()),
        raw_text(&totals.total_joins.to_string()),
        raw_text(&totals.total_words.to_string()),
    ];
    let column_settings: Vec<Value> = TABLE_ALIGNMENT
        .iter()
        .map(|align| json!({ "align": align }))
        .collect();

    let mut blocks = vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": format!("📊 {}", title) }
        }),
        json!({ "type": "divider" }),
        json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*Report for {}*", shown) }
        }),
        json!({
            "type": "table",
            "rows": [header_row, data_row],
            "column_settings": column_settings
        }),
    ];

    if let Some(members) = totals.member_count {
        blocks.push(json!({
            "type": "context",
            "elements": [
                { "type": "mrkdwn", "text": format!("Channel members: {}", members) }
            ]
        }));
    }

    blocks.push(json!({ "type": "divider" }));

    SummaryMessage {
        text: format!("{} for {}", title, shown),
        blocks,
    }
}

/// Warning posted to a channel when an on-demand run fails.
pub fn failure_text(summary: &str) -> String {
    format!(":warning: Failed to generate report: {}", summary)
}

fn raw_text(text: &str) -> Value {
    json!({ "type": "raw_text", "text": text })
}
