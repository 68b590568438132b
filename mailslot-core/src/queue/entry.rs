//! Captured message records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One chat message captured from a guild channel
///
/// Entries are copied into the queue on enqueue and handed out by value on
/// poll; nothing mutates an entry once it has been queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Source-assigned message id (empty for synthetic entries)
    #[serde(default)]
    pub id: String,
    /// Channel identifier
    pub channel_id: String,
    /// Human-readable channel name
    #[serde(default)]
    pub channel_name: String,
    /// Author identifier
    pub author_id: String,
    /// Author display name
    #[serde(default)]
    pub author_name: String,
    /// Message text
    #[serde(default)]
    pub content: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Id of the message this one replies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl Entry {
    /// Create a new entry stamped with the current time
    pub fn new(
        channel_id: impl Into<String>,
        author_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            channel_id: channel_id.into(),
            channel_name: String::new(),
            author_id: author_id.into(),
            author_name: String::new(),
            content: content.into(),
            timestamp: Utc::now(),
            reply_to: None,
        }
    }

    /// Set the message id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the channel display name
    pub fn with_channel_name(mut self, name: impl Into<String>) -> Self {
        self.channel_name = name.into();
        self
    }

    /// Set the author display name
    pub fn with_author_name(mut self, name: impl Into<String>) -> Self {
        self.author_name = name.into();
        self
    }

    /// Set the creation time
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Mark this entry as a reply to `message_id`
    pub fn reply_to(mut self, message_id: impl Into<String>) -> Self {
        self.reply_to = Some(message_id.into());
        self
    }

    /// Whether this entry qualifies for a channel filter.
    ///
    /// An empty filter matches everything. Otherwise either the channel id or
    /// the channel name may match, since callers sometimes hold only one of
    /// the two and the directory can lag behind renames.
    pub fn matches_channel(&self, filter: &str) -> bool {
        filter.is_empty() || self.channel_id == filter || self.channel_name == filter
    }

    /// One-line rendering: `[#channel] @author: content`
    pub fn formatted(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[#{}] @{}: {}",
            self.channel_name, self.author_name, self.content
        )
    }
}
