//! Gateway event ingestion
//!
//! Translates gateway dispatches into queue entries. Only human messages from
//! the configured guild whose channel passes the filter are queued; guild
//! snapshots refresh the channel directory.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::queue::{Entry, MessageQueue};
use crate::resolve::{ChannelDirectory, ChannelInfo, ChannelResolver};
use crate::safety::ChannelFilter;

/// Raw gateway payload envelope
#[derive(Debug, Deserialize)]
pub struct GatewayPayload {
    #[serde(default)]
    pub op: Option<u8>,
    #[serde(default)]
    pub t: Option<String>,
    #[serde(default)]
    pub d: Option<serde_json::Value>,
    #[serde(default)]
    pub s: Option<u64>,
}

/// Message author
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayAuthor {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

/// Reply target of a message
#[derive(Debug, Clone, Deserialize)]
pub struct MessageReference {
    #[serde(default)]
    pub message_id: Option<String>,
}

/// A `MESSAGE_CREATE` dispatch body
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayMessage {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub author: Option<GatewayAuthor>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message_reference: Option<MessageReference>,
}

/// A `GUILD_CREATE` dispatch body
#[derive(Debug, Clone, Deserialize)]
pub struct GuildSnapshot {
    pub id: String,
    #[serde(default)]
    pub channels: Vec<ChannelInfo>,
}

/// Dispatches the ingestor understands
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    MessageCreate(GatewayMessage),
    GuildCreate(GuildSnapshot),
    Other(String),
}

impl GatewayEvent {
    /// Decode a dispatch payload; unknown dispatch types become `Other`
    pub fn from_payload(payload: GatewayPayload) -> crate::Result<Self> {
        let kind = payload.t.unwrap_or_default();
        let data = payload.d.unwrap_or(serde_json::Value::Null);
        match kind.as_str() {
            "MESSAGE_CREATE" => Ok(Self::MessageCreate(serde_json::from_value(data)?)),
            "GUILD_CREATE" => Ok(Self::GuildCreate(serde_json::from_value(data)?)),
            _ => Ok(Self::Other(kind)),
        }
    }

    /// Decode one JSON line
    pub fn parse(line: &str) -> crate::Result<Self> {
        let payload: GatewayPayload = serde_json::from_str(line)?;
        Self::from_payload(payload)
    }
}

/// Why a message was not queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingAuthor,
    BotAuthor,
    OtherGuild,
    ChannelDenied,
    Unhandled,
}

/// Result of handling one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Enqueued,
    DirectoryRefreshed(usize),
    Skipped(SkipReason),
}

/// Routes gateway events into the queue and channel directory
pub struct Ingestor {
    queue: Arc<MessageQueue>,
    directory: Arc<ChannelDirectory>,
    filter: Option<Arc<ChannelFilter>>,
}

impl Ingestor {
    pub fn new(queue: Arc<MessageQueue>, directory: Arc<ChannelDirectory>) -> Self {
        Self {
            queue,
            directory,
            filter: None,
        }
    }

    /// Drop messages from channels `filter` denies before they are queued
    pub fn with_filter(mut self, filter: Arc<ChannelFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// An empty configured guild accepts every guild.
    fn in_scope(&self, guild_id: &str) -> bool {
        let configured = self.directory.guild_id();
        configured.is_empty() || configured == guild_id
    }

    pub fn handle_event(&self, event: GatewayEvent) -> IngestOutcome {
        match event {
            GatewayEvent::MessageCreate(msg) => self.handle_message_create(msg),
            GatewayEvent::GuildCreate(guild) => self.handle_guild_create(guild),
            GatewayEvent::Other(kind) => {
                debug!("Ignoring gateway dispatch {}", kind);
                IngestOutcome::Skipped(SkipReason::Unhandled)
            }
        }
    }

    pub fn handle_guild_create(&self, guild: GuildSnapshot) -> IngestOutcome {
        if !self.in_scope(&guild.id) {
            debug!(guild = %guild.id, "Ignoring snapshot for another guild");
            return IngestOutcome::Skipped(SkipReason::OtherGuild);
        }
        self.directory.refresh(guild.channels);
        IngestOutcome::DirectoryRefreshed(self.directory.len())
    }

    /// Queue a new message unless it is out of scope
    pub fn handle_message_create(&self, msg: GatewayMessage) -> IngestOutcome {
        let Some(author) = msg.author else {
            return IngestOutcome::Skipped(SkipReason::MissingAuthor);
        };

        // Ignore bot messages, including our own
        if author.bot {
            return IngestOutcome::Skipped(SkipReason::BotAuthor);
        }

        if !self.in_scope(msg.guild_id.as_deref().unwrap_or_default()) {
            return IngestOutcome::Skipped(SkipReason::OtherGuild);
        }

        let channel_name = self.directory.channel_name(&msg.channel_id);
        if let Some(filter) = &self.filter {
            if !filter.is_allowed(&channel_name) {
                debug!(channel = %channel_name, author = %author.username, "Message filtered by channel deny");
                return IngestOutcome::Skipped(SkipReason::ChannelDenied);
            }
        }

        let mut entry = Entry::new(msg.channel_id, author.id, msg.content)
            .with_id(msg.id)
            .with_channel_name(channel_name)
            .with_author_name(author.username);
        if let Some(timestamp) = msg.timestamp {
            entry = entry.with_timestamp(timestamp);
        }
        if let Some(reply) = msg.message_reference.and_then(|r| r.message_id) {
            entry = entry.reply_to(reply);
        }

        debug!(id = %entry.id, channel = %entry.channel_name, author = %entry.author_name, "Message enqueued");
        self.queue.enqueue(entry);
        IngestOutcome::Enqueued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ingestor(guild: &str) -> (Ingestor, Arc<MessageQueue>) {
        let queue = Arc::new(MessageQueue::with_capacity(16));
        let directory = Arc::new(ChannelDirectory::new(guild));
        directory.refresh(vec![
            ChannelInfo::text("100", "general"),
            ChannelInfo::text("200", "admin"),
        ]);
        (Ingestor::new(queue.clone(), directory), queue)
    }

    fn message(guild: &str, channel: &str, bot: bool) -> GatewayMessage {
        serde_json::from_value(json!({
            "id": "m1",
            "channel_id": channel,
            "guild_id": guild,
            "author": {"id": "u1", "username": "alice", "bot": bot},
            "content": "hello",
            "timestamp": "2026-01-15T10:30:00+00:00",
            "message_reference": {"message_id": "m0"}
        }))
        .unwrap()
    }

    #[test]
    fn test_message_is_translated_and_queued() {
        let (ingestor, queue) = ingestor("g1");
        let outcome = ingestor.handle_message_create(message("g1", "100", false));
        assert_eq!(outcome, IngestOutcome::Enqueued);

        let entries = queue.try_poll(0, "");
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.id, "m1");
        assert_eq!(entry.channel_name, "general");
        assert_eq!(entry.author_name, "alice");
        assert_eq!(entry.reply_to.as_deref(), Some("m0"));
        assert_eq!(entry.timestamp.to_rfc3339(), "2026-01-15T10:30:00+00:00");
        assert_eq!(entry.formatted(), "[#general] @alice: hello");
    }

    #[test]
    fn test_bot_and_foreign_guild_messages_are_skipped() {
        let (ingestor, queue) = ingestor("g1");
        assert_eq!(
            ingestor.handle_message_create(message("g1", "100", true)),
            IngestOutcome::Skipped(SkipReason::BotAuthor)
        );
        assert_eq!(
            ingestor.handle_message_create(message("g2", "100", false)),
            IngestOutcome::Skipped(SkipReason::OtherGuild)
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_missing_author_is_skipped() {
        let (ingestor, _queue) = ingestor("g1");
        let mut msg = message("g1", "100", false);
        msg.author = None;
        assert_eq!(
            ingestor.handle_message_create(msg),
            IngestOutcome::Skipped(SkipReason::MissingAuthor)
        );
    }

    #[test]
    fn test_filter_denies_by_channel_name() {
        let (ingestor, queue) = ingestor("g1");
        let ingestor =
            ingestor.with_filter(Arc::new(ChannelFilter::new(Vec::<String>::new(), ["admin"])));
        assert_eq!(
            ingestor.handle_message_create(message("g1", "200", false)),
            IngestOutcome::Skipped(SkipReason::ChannelDenied)
        );
        assert_eq!(
            ingestor.handle_message_create(message("g1", "100", false)),
            IngestOutcome::Enqueued
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_unknown_channel_uses_id_as_name() {
        let (ingestor, queue) = ingestor("g1");
        ingestor.handle_message_create(message("g1", "555", false));
        assert_eq!(queue.try_poll(0, "")[0].channel_name, "555");
    }

    #[test]
    fn test_empty_guild_scope_accepts_any_guild() {
        let (ingestor, queue) = ingestor("");
        ingestor.handle_message_create(message("anything", "100", false));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_parse_dispatch_lines() {
        let (ingestor, _queue) = ingestor("g1");

        let guild = GatewayEvent::parse(
            r#"{"op":0,"s":1,"t":"GUILD_CREATE","d":{"id":"g1","channels":[{"id":"300","name":"random","type":0},{"id":"301","name":"lobby","type":2}]}}"#,
        )
        .unwrap();
        assert_eq!(ingestor.handle_event(guild), IngestOutcome::DirectoryRefreshed(1));

        let typing = GatewayEvent::parse(r#"{"op":0,"t":"TYPING_START","d":{}}"#).unwrap();
        assert_eq!(
            ingestor.handle_event(typing),
            IngestOutcome::Skipped(SkipReason::Unhandled)
        );

        assert!(GatewayEvent::parse(r#"{"t":"MESSAGE_CREATE","d":{"id":1}}"#).is_err());
        assert!(GatewayEvent::parse("not json").is_err());
    }
}
