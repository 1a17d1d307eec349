//! Inbound Slack payloads: Events API callbacks and slash commands.

use serde_json::Value;

use crate::error::ChannelError;

/// Slack event types the service reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlackEvent {
    /// A message was posted in a channel.
    Message {
        channel: String,
        user: Option<String>,
        text: String,
        ts: String,
        thread_ts: Option<String>,
        subtype: Option<String>,
        /// Set when a bot (including this one) posted the message.
        bot_id: Option<String>,
    },
    /// A reaction was added to an item.
    ReactionAdded {
        user: Option<String>,
        reaction: String,
        item_channel: String,
        item_ts: String,
    },
}

impl SlackEvent {
    /// Parse the inner `event` object of an `event_callback`.
    ///
    /// Returns `None` for event types the service does not handle.
    pub fn from_event(event: &Value) -> Option<Self> {
        let str_field = |key: &str| event.get(key).and_then(Value::as_str).map(str::to_string);

        match event.get("type").and_then(Value::as_str)? {
            "message" => Some(SlackEvent::Message {
                channel: str_field("channel")?,
                user: str_field("user"),
                text: str_field("text").unwrap_or_default(),
                ts: str_field("ts")?,
                thread_ts: str_field("thread_ts"),
                subtype: str_field("subtype"),
                bot_id: str_field("bot_id"),
            }),
            "reaction_added" => {
                let item = event.get("item")?;
                Some(SlackEvent::ReactionAdded {
                    user: str_field("user"),
                    reaction: str_field("reaction")?,
                    item_channel: item.get("channel").and_then(Value::as_str)?.to_string(),
                    item_ts: item.get("ts").and_then(Value::as_str)?.to_string(),
                })
            }
            _ => None,
        }
    }

    /// True for a human reply inside a thread: not the thread parent, not a
    /// system subtype, not posted by a bot and not blank.
    pub fn is_thread_reply(&self) -> bool {
        match self {
            SlackEvent::Message {
                text,
                ts,
                thread_ts,
                subtype,
                bot_id,
                ..
            } => {
                subtype.is_none()
                    && bot_id.is_none()
                    && thread_ts.as_deref().is_some_and(|t| t != ts)
                    && !text.trim().is_empty()
            }
            SlackEvent::ReactionAdded { .. } => false,
        }
    }
}

/// A slash-command invocation (form-encoded by Slack).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlashCommand {
    pub command: String,
    pub text: String,
    pub user_id: String,
    pub channel_id: String,
    pub response_url: Option<String>,
    pub trigger_id: Option<String>,
}

impl SlashCommand {
    /// Parse an `application/x-www-form-urlencoded` body.
    pub fn from_form(body: &[u8]) -> Result<Self, ChannelError> {
        let mut cmd = SlashCommand::default();
        for (key, value) in url::form_urlencoded::parse(body) {
            match key.as_ref() {
                "command" => cmd.command = value.into_owned(),
                "text" => cmd.text = value.into_owned(),
                "user_id" => cmd.user_id = value.into_owned(),
                "channel_id" => cmd.channel_id = value.into_owned(),
                "response_url" => cmd.response_url = Some(value.into_owned()),
                "trigger_id" => cmd.trigger_id = Some(value.into_owned()),
                _ => {}
            }
        }

        if cmd.command.is_empty() {
            return Err(ChannelError::InvalidResponse("slash command missing 'command'".to_string()));
        }
        if cmd.channel_id.is_empty() {
            return Err(ChannelError::InvalidResponse(
                "slash command missing 'channel_id'".to_string(),
            ));
        }

        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_thread_reply() {
        let event = json!({
            "type": "message",
            "channel": "C1",
            "user": "U1",
            "text": "thanks, great work",
            "ts": "1700000001.000200",
            "thread_ts": "1700000000.000100"
        });
        let parsed = SlackEvent::from_event(&event).unwrap();
        assert!(parsed.is_thread_reply());
    }

    #[test]
    fn test_thread_parent_and_subtypes_are_not_replies() {
        let parent = json!({
            "type": "message", "channel": "C1", "text": "hi",
            "ts": "1.0", "thread_ts": "1.0"
        });
        assert!(!SlackEvent::from_event(&parent).unwrap().is_thread_reply());

        let edited = json!({
            "type": "message", "channel": "C1", "text": "hi",
            "ts": "2.0", "thread_ts": "1.0", "subtype": "message_changed"
        });
        assert!(!SlackEvent::from_event(&edited).unwrap().is_thread_reply());

        let blank = json!({
            "type": "message", "channel": "C1", "text": "   ",
            "ts": "2.0", "thread_ts": "1.0"
        });
        assert!(!SlackEvent::from_event(&blank).unwrap().is_thread_reply());

        let from_bot = json!({
            "type": "message", "channel": "C1", "text": "Thread reply detected",
            "ts": "3.0", "thread_ts": "1.0", "bot_id": "B1"
        });
        assert!(!SlackEvent::from_event(&from_bot).unwrap().is_thread_reply());
    }

    #[test]
    fn test_parse_reaction_added() {
        let event = json!({
            "type": "reaction_added",
            "user": "U2",
            "reaction": "tada",
            "item": {"type": "message", "channel": "C1", "ts": "1700000000.000100"}
        });
        match SlackEvent::from_event(&event).unwrap() {
            SlackEvent::ReactionAdded { reaction, item_channel, .. } => {
                assert_eq!(reaction, "tada");
                assert_eq!(item_channel, "C1");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_ignored() {
        assert!(SlackEvent::from_event(&json!({"type": "team_join"})).is_none());
    }

    #[test]
    fn test_parse_slash_command() {
        let body = b"token=x&command=%2Fdailyreport&text=&user_id=U1&channel_id=C9&response_url=https%3A%2F%2Fhooks.slack.com%2Fx";
        let cmd = SlashCommand::from_form(body).unwrap();
        assert_eq!(cmd.command, "/dailyreport");
        assert_eq!(cmd.channel_id, "C9");
        assert_eq!(cmd.response_url.as_deref(), Some("https://hooks.slack.com/x"));
    }

    #[test]
    fn test_slash_command_requires_channel() {
        assert!(SlashCommand::from_form(b"command=%2Fdailyreport").is_err());
    }
}
