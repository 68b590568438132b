//! Channel name <-> id directory for a single guild

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Error, Result};

/// Channel kind for guild text channels
pub const TEXT_CHANNEL: u8 = 0;

/// Name/id lookups used by ingestion and the poll handler
pub trait ChannelResolver: Send + Sync {
    /// Display name for `id`, or `id` itself when unknown
    fn channel_name(&self, id: &str) -> String;

    /// Id for `name` (a leading `#` is ignored)
    fn channel_id(&self, name: &str) -> Result<String>;
}

/// A guild channel as announced by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: u8,
}

impl ChannelInfo {
    pub fn text(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: TEXT_CHANNEL,
        }
    }
}

#[derive(Default)]
struct Maps {
    by_id: HashMap<String, String>,
    by_name: HashMap<String, String>,
}

/// In-memory bidirectional channel cache
///
/// Empty until [`refresh`](Self::refresh) is called. Refresh builds both maps
/// up front and swaps them in under a short write lock.
pub struct ChannelDirectory {
    guild_id: String,
    maps: RwLock<Maps>,
}

impl ChannelDirectory {
    pub fn new(guild_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            maps: RwLock::new(Maps::default()),
        }
    }

    /// Guild this directory indexes
    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    /// Replace the cache with `channels`, keeping text channels only
    pub fn refresh<I>(&self, channels: I)
    where
        I: IntoIterator<Item = ChannelInfo>,
    {
        let mut next = Maps::default();
        for channel in channels {
            if channel.kind != TEXT_CHANNEL {
                continue;
            }
            next.by_name.insert(channel.name.clone(), channel.id.clone());
            next.by_id.insert(channel.id, channel.name);
        }
        let count = next.by_id.len();
        *self.maps.write() = next;
        tracing::debug!(guild = %self.guild_id, count, "Channel directory refreshed");
    }

    /// Number of indexed channels
    pub fn len(&self) -> usize {
        self.maps.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChannelResolver for ChannelDirectory {
    fn channel_name(&self, id: &str) -> String {
        self.maps
            .read()
            .by_id
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    fn channel_id(&self, name: &str) -> Result<String> {
        let name = name.strip_prefix('#').unwrap_or(name);
        self.maps
            .read()
            .by_name
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("channel \"{}\"", name)))
    }
}

/// Resolve a user-supplied channel reference to an id.
///
/// A leading `#` is stripped. Non-empty all-digit input is already an id;
/// anything else is looked up by name.
pub fn resolve_channel_param(resolver: &dyn ChannelResolver, channel: &str) -> Result<String> {
    let channel = channel.strip_prefix('#').unwrap_or(channel);
    if !channel.is_empty() && channel.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(channel.to_string());
    }
    resolver.channel_id(channel)
}
