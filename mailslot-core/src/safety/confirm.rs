//! Single-use confirmation tokens for destructive tools

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::SafetyConfig;

/// How long an issued token stays valid
pub const CONFIRMATION_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct Pending {
    tool: String,
    resource: String,
    issued: Instant,
}

/// Tracks which tools need confirmation and the tokens issued for them
pub struct ConfirmationTracker {
    destructive: HashSet<String>,
    pending: Mutex<HashMap<String, Pending>>,
    ttl: Duration,
}

impl ConfirmationTracker {
    pub fn new<I>(destructive_tools: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            destructive: destructive_tools.into_iter().map(Into::into).collect(),
            pending: Mutex::new(HashMap::new()),
            ttl: CONFIRMATION_TTL,
        }
    }

    /// Tracker for the tools listed in `safety.destructive_tools`
    pub fn from_config(config: &SafetyConfig) -> Self {
        Self::new(config.destructive_tools.iter().cloned())
    }

    /// Override the token lifetime
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn needs_confirmation(&self, tool: &str) -> bool {
        self.destructive.contains(tool)
    }

    /// Issue a fresh token for running `tool` against `resource`
    pub fn request_confirmation(&self, tool: &str, resource: &str, description: &str) -> String {
        let token = Uuid::new_v4().to_string();
        let mut pending = self.pending.lock();
        let ttl = self.ttl;
        pending.retain(|_, p| p.issued.elapsed() <= ttl);
        pending.insert(
            token.clone(),
            Pending {
                tool: tool.to_string(),
                resource: resource.to_string(),
                issued: Instant::now(),
            },
        );
        tracing::debug!(tool, resource, description, "Confirmation requested");
        token
    }

    /// Consume `token`; true exactly once per unexpired token
    pub fn confirm(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        match self.pending.lock().remove(token) {
            Some(p) if p.issued.elapsed() <= self.ttl => {
                tracing::debug!(tool = %p.tool, resource = %p.resource, "Confirmation accepted");
                true
            }
            _ => false,
        }
    }

    /// Tokens issued but not yet consumed or pruned
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}
