//! Folds paginated channel history into an [`AggregateResult`].

use crate::channels::HistorySource;
use crate::error::ReportError;
use crate::types::{AggregateResult, MessageRecord, MetricsWindow};

/// Page size requested from `conversations.history`.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

const JOIN_SUBTYPE: &str = "channel_join";

/// Walk the cursor chain for `window` and total words, reactions and joins.
///
/// Pages are fetched strictly in order; the loop ends only when a page comes
/// back without a cursor. Any failed fetch aborts the whole run and no partial
/// totals are returned.
pub async fn aggregate(
    source: &dyn HistorySource,
    window: &MetricsWindow,
    page_size: u32,
) -> Result<AggregateResult, ReportError> {
    let mut totals = AggregateResult::default();
    let mut cursor: Option<String> = None;
    let mut pages = 0u32;

    loop {
        let page = source
            .fetch_page(&window.channel_id, window.oldest, page_size, cursor.as_deref())
            .await
            .map_err(|e| ReportError::SourceUnavailable(e.to_string()))?;
        pages += 1;

        for record in &page.messages {
            tally(&mut totals, record);
        }

        cursor = page.next_cursor.filter(|c| !c.is_empty());
        if cursor.is_none() {
            break;
        }
    }

    tracing::info!(
        channel = %window.channel_id,
        pages,
        words = totals.total_words,
        reactions = totals.total_reactions,
        joins = totals.total_joins,
        "Aggregated channel history"
    );

    Ok(totals)
}

/// Add one record's contribution to `totals`.
pub fn tally(totals: &mut AggregateResult, record: &MessageRecord) {
    if record.kind == "message" {
        if let Some(text) = record.text.as_deref() {
            totals.total_words += count_words(text);
        }
    }

    totals.total_reactions += record.reactions.iter().map(|r| r.count).sum::<u64>();

    if record.subtype.as_deref() == Some(JOIN_SUBTYPE) {
        totals.total_joins += 1;
    }
}

/// Whitespace-delimited tokens in `text`. Blank text counts zero.
pub fn count_words(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}
