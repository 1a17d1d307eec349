//! Reposts sentiment summaries for thread replies and reactions.

use std::sync::Arc;
use tracing::{debug, info};

use super::{classify_reaction, classify_text, summary_blocks};
use crate::channels::slack::truncate_preview;
use crate::channels::{Notifier, SlackEvent, WorkspaceLookup};
use crate::error::ChannelError;

/// Longest reply preview quoted in a thread summary.
const REPLY_PREVIEW_MAX_CHARS: usize = 140;

/// Handles `message` and `reaction_added` events.
///
/// With a summary channel configured every summary goes there. Without one,
/// reply summaries go into the reply's thread and reaction summaries into the
/// reacted message's channel.
pub struct SentimentHandler {
    lookup: Arc<dyn WorkspaceLookup>,
    notifier: Arc<dyn Notifier>,
    summary_channel: Option<String>,
}

impl SentimentHandler {
    pub fn new(
        lookup: Arc<dyn WorkspaceLookup>,
        notifier: Arc<dyn Notifier>,
        summary_channel: Option<String>,
    ) -> Self {
        Self {
            lookup,
            notifier,
            summary_channel: summary_channel.filter(|c| !c.trim().is_empty()),
        }
    }

    pub fn summary_channel(&self) -> Option<&str> {
        self.summary_channel.as_deref()
    }

    /// Handle one event. Returns `Ok(true)` when a summary was posted.
    pub async fn handle(&self, event: &SlackEvent) -> Result<bool, ChannelError> {
        match event {
            SlackEvent::Message {
                channel,
                user,
                text,
                ts,
                thread_ts: Some(thread_ts),
                ..
            } if event.is_thread_reply() => {
                self.on_thread_reply(channel, user.as_deref(), text, ts, thread_ts)
                    .await?;
                Ok(true)
            }
            SlackEvent::Message { .. } => {
                debug!("Ignoring message that is not a thread reply");
                Ok(false)
            }
            SlackEvent::ReactionAdded {
                user,
                reaction,
                item_channel,
                item_ts,
            } => {
                self.on_reaction(user.as_deref(), reaction, item_channel, item_ts)
                    .await?;
                Ok(true)
            }
        }
    }

    async fn on_thread_reply(
        &self,
        channel: &str,
        user: Option<&str>,
        text: &str,
        ts: &str,
        thread_ts: &str,
    ) -> Result<(), ChannelError> {
        let sentiment = classify_text(text);
        let author = self.lookup.user_label(user).await;
        let permalink = self.lookup.permalink(channel, ts).await?;

        let blocks = summary_blocks(
            &format!("Reply from {}", author),
            sentiment.label,
            &[
                format!("*Sentiment:* {}", sentiment.label),
                format!("*Preview:* {}", truncate_preview(text, REPLY_PREVIEW_MAX_CHARS)),
            ],
            Some(&permalink),
        );
        let fallback = format!("Thread reply detected ({})", sentiment.label);

        match &self.summary_channel {
            Some(summary) => self.notifier.post_message(summary, &fallback, blocks).await?,
            None => {
                self.notifier
                    .post_in_thread(channel, thread_ts, &fallback, blocks)
                    .await?
            }
        }

        info!(channel, score = sentiment.score, label = %sentiment.label, "Thread reply summarized");
        Ok(())
    }

    async fn on_reaction(
        &self,
        user: Option<&str>,
        reaction: &str,
        item_channel: &str,
        item_ts: &str,
    ) -> Result<(), ChannelError> {
        let sentiment = classify_reaction(reaction);
        let reactor = self.lookup.user_label(user).await;
        let permalink = self.lookup.permalink(item_channel, item_ts).await?;
        let preview = self.lookup.message_preview(item_channel, item_ts).await;

        let mut body = vec![format!("*Sentiment:* {}", sentiment.label)];
        if !preview.is_empty() {
            body.push(format!("*Message:* {}", preview));
        }

        let blocks = summary_blocks(
            &format!("Reaction {} from {}", reaction, reactor),
            sentiment.label,
            &body,
            Some(&permalink),
        );
        let fallback = format!("Reaction recorded ({})", sentiment.label);
        let target = self.summary_channel.as_deref().unwrap_or(item_channel);

        self.notifier.post_message(target, &fallback, blocks).await?;

        info!(channel = item_channel, reaction, label = %sentiment.label, "Reaction summarized");
        Ok(())
    }
}
