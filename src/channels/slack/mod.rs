//! Slack Web API client for channel-digest.
//!
//! A thin reqwest adapter over the handful of Web API methods the service
//! needs. Every call is rate limited by its method tier, and any response
//! with `ok: false` becomes a [`ChannelError::Api`].

mod config;
mod events;

pub use config::SlackConfig;
pub use events::{SlackEvent, SlashCommand};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use crate::channels::common::{RateLimitConfig, RateLimiter, SlackTier};
use crate::channels::{ChannelInfoSource, HistorySource, Notifier, WorkspaceLookup};
use crate::error::ChannelError;
use crate::types::{ChannelInfo, MessagePage, MessageRecord};

/// Longest message preview shown in sentiment summaries.
const PREVIEW_MAX_CHARS: usize = 120;

/// Slack Web API client.
#[derive(Debug, Clone)]
pub struct SlackClient {
    config: SlackConfig,
    http: reqwest::Client,
    history_limiter: RateLimiter,
    info_limiter: RateLimiter,
    lookup_limiter: RateLimiter,
    post_limiter: RateLimiter,
}

impl SlackClient {
    /// Create a new client with the given configuration.
    pub fn new(config: SlackConfig) -> Result<Self, ChannelError> {
        config.validate().map_err(ChannelError::InvalidConfig)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            config,
            http,
            history_limiter: RateLimiter::for_tier(SlackTier::Tier3),
            info_limiter: RateLimiter::for_tier(SlackTier::Tier2),
            lookup_limiter: RateLimiter::for_tier(SlackTier::Tier4),
            post_limiter: RateLimiter::for_tier(SlackTier::Special),
        })
    }

    /// Replace every method limiter with `limits`.
    pub fn with_rate_limits(mut self, limits: RateLimitConfig) -> Self {
        self.history_limiter = RateLimiter::new(limits.clone());
        self.info_limiter = RateLimiter::new(limits.clone());
        self.lookup_limiter = RateLimiter::new(limits.clone());
        self.post_limiter = RateLimiter::new(limits);
        self
    }

    pub fn config(&self) -> &SlackConfig {
        &self.config
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.config.api_base, method)
    }

    /// Call a read method with query parameters.
    async fn get(
        &self,
        method: &str,
        limiter: &RateLimiter,
        params: &[(&str, String)],
    ) -> Result<Value, ChannelError> {
        limiter.acquire().await;

        let response = self
            .http
            .get(self.url(method))
            .bearer_auth(&self.config.bot_token)
            .query(params)
            .send()
            .await?;

        Self::read_body(method, response).await
    }

    /// Call a write method with a JSON body.
    async fn post(
        &self,
        method: &str,
        limiter: &RateLimiter,
        body: &Value,
    ) -> Result<Value, ChannelError> {
        limiter.acquire().await;

        let response = self
            .http
            .post(self.url(method))
            .bearer_auth(&self.config.bot_token)
            .json(body)
            .send()
            .await?;

        Self::read_body(method, response).await
    }

    async fn read_body(method: &str, response: reqwest::Response) -> Result<Value, ChannelError> {
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ChannelError::RateLimited {
                retry_after: retry_after * 1000,
            });
        }

        if !response.status().is_success() {
            return Err(ChannelError::Http(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ChannelError::InvalidResponse(format!("{}: {}", method, e)))?;

        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            return Err(ChannelError::Api {
                method: method.to_string(),
                error: error.to_string(),
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl HistorySource for SlackClient {
    async fn fetch_page(
        &self,
        channel_id: &str,
        oldest: i64,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<MessagePage, ChannelError> {
        let mut params = vec![
            ("channel", channel_id.to_string()),
            ("oldest", oldest.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }

        let mut body = self
            .get("conversations.history", &self.history_limiter, &params)
            .await?;

        let messages = body
            .get_mut("messages")
            .map(Value::take)
            .ok_or_else(|| {
                ChannelError::InvalidResponse("conversations.history: missing messages".to_string())
            })?;
        let messages: Vec<MessageRecord> = serde_json::from_value(messages)
            .map_err(|e| ChannelError::InvalidResponse(format!("conversations.history: {}", e)))?;

        let next_cursor = body
            .pointer("/response_metadata/next_cursor")
            .and_then(Value::as_str)
            .map(str::to_string);

        tracing::debug!(
            channel = channel_id,
            count = messages.len(),
            has_more = next_cursor.as_deref().is_some_and(|c| !c.is_empty()),
            "Fetched history page"
        );

        Ok(MessagePage::new(messages, next_cursor))
    }
}

#[async_trait]
impl ChannelInfoSource for SlackClient {
    async fn channel_info(&self, channel_id: &str) -> Result<ChannelInfo, ChannelError> {
        let body = self
            .get(
                "conversations.info",
                &self.info_limiter,
                &[
                    ("channel", channel_id.to_string()),
                    ("include_num_members", "true".to_string()),
                ],
            )
            .await?;

        let channel = body
            .get("channel")
            .ok_or_else(|| ChannelError::InvalidResponse("conversations.info: missing channel".to_string()))?;

        Ok(ChannelInfo {
            id: channel
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or(channel_id)
                .to_string(),
            name: channel.get("name").and_then(Value::as_str).map(str::to_string),
            member_count: channel.get("num_members").and_then(Value::as_u64).unwrap_or(0),
        })
    }
}

#[async_trait]
impl Notifier for SlackClient {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        blocks: Vec<Value>,
    ) -> Result<(), ChannelError> {
        self.chat_post(channel, text, blocks, None).await
    }

    async fn post_in_thread(
        &self,
        channel: &str,
        thread_ts: &str,
        text: &str,
        blocks: Vec<Value>,
    ) -> Result<(), ChannelError> {
        self.chat_post(channel, text, blocks, Some(thread_ts)).await
    }
}

impl SlackClient {
    async fn chat_post(
        &self,
        channel: &str,
        text: &str,
        blocks: Vec<Value>,
        thread_ts: Option<&str>,
    ) -> Result<(), ChannelError> {
        let mut body = json!({
            "channel": channel,
            "text": text,
        });
        if !blocks.is_empty() {
            body["blocks"] = Value::Array(blocks);
        }
        if let Some(ts) = thread_ts {
            body["thread_ts"] = Value::String(ts.to_string());
        }

        self.post("chat.postMessage", &self.post_limiter, &body).await?;
        tracing::info!(channel, threaded = thread_ts.is_some(), "Posted message to Slack");
        Ok(())
    }
}

#[async_trait]
impl WorkspaceLookup for SlackClient {
    async fn user_label(&self, user_id: Option<&str>) -> String {
        const FALLBACK: &str = "Someone";

        let Some(user_id) = user_id.filter(|u| !u.is_empty()) else {
            return FALLBACK.to_string();
        };

        match self
            .get("users.info", &self.lookup_limiter, &[("user", user_id.to_string())])
            .await
        {
            Ok(body) => {
                let real_name = body.pointer("/user/real_name").and_then(Value::as_str);
                let display_name = body.pointer("/user/profile/display_name").and_then(Value::as_str);
                real_name
                    .filter(|n| !n.is_empty())
                    .or(display_name.filter(|n| !n.is_empty()))
                    .unwrap_or(FALLBACK)
                    .to_string()
            }
            Err(e) => {
                tracing::debug!(user = user_id, error = %e, "users.info failed");
                FALLBACK.to_string()
            }
        }
    }

    async fn permalink(&self, channel: &str, ts: &str) -> Result<String, ChannelError> {
        let body = self
            .get(
                "chat.getPermalink",
                &self.lookup_limiter,
                &[("channel", channel.to_string()), ("message_ts", ts.to_string())],
            )
            .await?;

        body.get("permalink")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ChannelError::InvalidResponse("chat.getPermalink: missing permalink".to_string()))
    }

    async fn message_preview(&self, channel: &str, ts: &str) -> String {
        let result = self
            .get(
                "conversations.replies",
                &self.history_limiter,
                &[
                    ("channel", channel.to_string()),
                    ("ts", ts.to_string()),
                    ("inclusive", "true".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await;

        match result {
            Ok(body) => {
                let text = body
                    .pointer("/messages/0/text")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                truncate_preview(text, PREVIEW_MAX_CHARS)
            }
            Err(e) => {
                tracing::debug!(channel, ts, error = %e, "conversations.replies failed");
                String::new()
            }
        }
    }
}

/// Shorten `text` to at most `max` characters, ending in "..." when cut.
pub fn truncate_preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> SlackClient {
        let config = SlackConfig::new("xoxb-test").with_api_base(&server.uri());
        SlackClient::new(config)
            .unwrap()
            .with_rate_limits(RateLimitConfig::unlimited())
    }

    #[tokio::test]
    async fn test_fetch_page_sends_window_and_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.history"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(query_param("channel", "C1"))
            .and(query_param("oldest", "1700000000"))
            .and(query_param("limit", "1000"))
            .and(query_param("cursor", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "messages": [
                    {"type": "message", "text": "hello world"},
                    {"type": "message", "subtype": "channel_join", "text": "<@U1> has joined"}
                ],
                "response_metadata": {"next_cursor": "def"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let page = client
            .fetch_page("C1", 1_700_000_000, 1000, Some("abc"))
            .await
            .unwrap();

        assert_eq!(page.messages.len(), 2);
        assert_eq!(page.messages[1].subtype.as_deref(), Some("channel_join"));
        assert_eq!(page.next_cursor.as_deref(), Some("def"));
    }

    #[tokio::test]
    async fn test_fetch_page_last_page_has_no_cursor() {
        let server = MockServer::start().await;
        Mock::given(path("/conversations.history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "messages": [],
                "response_metadata": {"next_cursor": ""}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let page = client.fetch_page("C1", 0, 1000, None).await.unwrap();
        assert!(page.messages.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_not_ok_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(path("/conversations.history"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": false, "error": "channel_not_found"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.fetch_page("C404", 0, 1000, None).await.unwrap_err();
        match err {
            ChannelError::Api { method, error } => {
                assert_eq!(method, "conversations.history");
                assert_eq!(error, "channel_not_found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_429_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(path("/chat.postMessage"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.post_message("C1", "hi", Vec::new()).await.unwrap_err();
        assert!(matches!(err, ChannelError::RateLimited { retry_after: 7000 }));
    }

    #[tokio::test]
    async fn test_post_message_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(body_partial_json(json!({
                "channel": "C1",
                "text": "Report",
                "blocks": [{"type": "divider"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client
            .post_message("C1", "Report", vec![json!({"type": "divider"})])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_post_in_thread_sets_thread_ts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(body_partial_json(json!({"channel": "C1", "thread_ts": "1700000000.000100"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client
            .post_in_thread("C1", "1700000000.000100", "Reply", Vec::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_channel_info_member_count() {
        let server = MockServer::start().await;
        Mock::given(path("/conversations.info"))
            .and(query_param("channel", "C1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "channel": {"id": "C1", "name": "general", "num_members": 42}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let info = client.channel_info("C1").await.unwrap();
        assert_eq!(info.member_count, 42);
        assert_eq!(info.name.as_deref(), Some("general"));
    }

    #[tokio::test]
    async fn test_user_label_fallbacks() {
        let server = MockServer::start().await;
        Mock::given(path("/users.info"))
            .and(query_param("user", "U1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "user": {"real_name": "", "profile": {"display_name": "ada"}}
            })))
            .mount(&server)
            .await;
        Mock::given(path("/users.info"))
            .and(query_param("user", "U2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "user_not_found"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert_eq!(client.user_label(Some("U1")).await, "ada");
        assert_eq!(client.user_label(Some("U2")).await, "Someone");
        assert_eq!(client.user_label(None).await, "Someone");
    }

    #[test]
    fn test_truncate_preview() {
        assert_eq!(truncate_preview("short", 120), "short");
        let long = "x".repeat(150);
        let preview = truncate_preview(&long, 120);
        assert_eq!(preview.chars().count(), 120);
        assert!(preview.ends_with("..."));
    }
}
