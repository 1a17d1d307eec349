//! Slack-facing collaborators for channel-digest.
//!
//! The report pipeline never talks to Slack directly. It depends on the
//! capabilities below, each of which the [`slack::SlackClient`] implements
//! and each of which tests replace with an in-memory fake.
//!
//! ```text
//! ┌──────────────────┐     ┌───────────────────┐
//! │  ReportPipeline  │────▶│  HistorySource    │  conversations.history
//! │                  │────▶│  ChannelInfoSource│  conversations.info
//! │                  │────▶│  Notifier         │  chat.postMessage
//! └──────────────────┘     └───────────────────┘
//! ```

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::types::{ChannelInfo, MessagePage};

pub mod common;
pub mod slack;

pub use common::{RateLimitConfig, RateLimiter, SlackTier};
pub use slack::{SlackClient, SlackConfig, SlackEvent, SlashCommand};

/// Paginated message history for a channel.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetch one page of messages newer than `oldest` (Unix seconds).
    ///
    /// An upstream `ok: false` must come back as an error, never as an empty page.
    async fn fetch_page(
        &self,
        channel_id: &str,
        oldest: i64,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<MessagePage, ChannelError>;
}

/// Channel metadata lookups.
#[async_trait]
pub trait ChannelInfoSource: Send + Sync {
    async fn channel_info(&self, channel_id: &str) -> Result<ChannelInfo, ChannelError>;
}

/// Posts messages to a channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post `text` (the notification fallback) with Block Kit `blocks`.
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        blocks: Vec<serde_json::Value>,
    ) -> Result<(), ChannelError>;

    /// Post as a reply in the thread rooted at `thread_ts`. Notifiers without
    /// thread support post to the channel instead.
    async fn post_in_thread(
        &self,
        channel: &str,
        _thread_ts: &str,
        text: &str,
        blocks: Vec<serde_json::Value>,
    ) -> Result<(), ChannelError> {
        self.post_message(channel, text, blocks).await
    }
}

/// Best-effort workspace lookups used when summarizing events.
#[async_trait]
pub trait WorkspaceLookup: Send + Sync {
    /// Human label for a user, falling back to "Someone".
    async fn user_label(&self, user_id: Option<&str>) -> String;

    /// Permalink of a message.
    async fn permalink(&self, channel: &str, ts: &str) -> Result<String, ChannelError>;

    /// Short preview of a message, empty when it cannot be read.
    async fn message_preview(&self, channel: &str, ts: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ChannelOnly {
        posts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for ChannelOnly {
        async fn post_message(
            &self,
            channel: &str,
            text: &str,
            _blocks: Vec<serde_json::Value>,
        ) -> Result<(), ChannelError> {
            self.posts.lock().unwrap().push((channel.to_string(), text.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_post_in_thread_defaults_to_channel_post() {
        let notifier = ChannelOnly::default();
        notifier
            .post_in_thread("C1", "1700000000.000100", "hello", Vec::new())
            .await
            .unwrap();

        let posts = notifier.posts.lock().unwrap().clone();
        assert_eq!(posts, vec![("C1".to_string(), "hello".to_string())]);
    }
}
