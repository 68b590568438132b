//! Long-poll request handling
//!
//! Normalizes caller-supplied timeout and limit against [`QueueConfig`],
//! resolves the channel filter, waits on the queue and records every call in
//! the audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::QueueConfig;
use crate::queue::{Entry, MessageQueue};
use crate::resolve::{resolve_channel_param, ChannelResolver};
use crate::safety::audit::{self, AuditEntry, AuditLogger};

/// Audit name for poll calls
pub const POLL_TOOL: &str = "discord_poll_messages";

/// Caller-supplied poll parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollRequest {
    #[serde(default)]
    pub timeout_secs: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
    /// Channel name or id
    #[serde(default)]
    pub channel: Option<String>,
}

/// Parameters after defaults and caps are applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollParams {
    pub timeout_secs: u64,
    pub limit: usize,
    /// Caller's channel reference as given, empty for none
    pub channel: String,
}

impl PollParams {
    /// Apply defaults for missing or non-positive values and cap the timeout
    pub fn normalize(request: &PollRequest, config: &QueueConfig) -> Self {
        let timeout_secs = match request.timeout_secs {
            Some(secs) if secs > 0 => (secs as u64).min(config.max_poll_timeout_secs),
            _ => config.poll_timeout_secs.min(config.max_poll_timeout_secs),
        };
        let limit = match request.limit {
            Some(limit) if limit > 0 => usize::try_from(limit).unwrap_or(usize::MAX),
            _ => config.default_limit,
        };
        Self {
            timeout_secs,
            limit,
            channel: request.channel.clone().unwrap_or_default(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// What a poll produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Messages(Vec<Entry>),
    NoMessages,
}

impl PollOutcome {
    pub fn into_entries(self) -> Vec<Entry> {
        match self {
            PollOutcome::Messages(entries) => entries,
            PollOutcome::NoMessages => Vec::new(),
        }
    }
}

/// Serves poll requests against a shared queue
pub struct PollHandler {
    queue: Arc<MessageQueue>,
    resolver: Arc<dyn ChannelResolver>,
    config: QueueConfig,
    audit: Option<Arc<AuditLogger>>,
}

impl PollHandler {
    pub fn new(
        queue: Arc<MessageQueue>,
        resolver: Arc<dyn ChannelResolver>,
        config: QueueConfig,
    ) -> Self {
        Self {
            queue,
            resolver,
            config,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: Option<Arc<AuditLogger>>) -> Self {
        self.audit = audit;
        self
    }

    /// Wait for messages matching `request`
    ///
    /// Timeout and cancellation are not errors; both yield
    /// [`PollOutcome::NoMessages`]. An unresolvable channel is.
    pub async fn handle(
        &self,
        cancel: &CancellationToken,
        request: &PollRequest,
    ) -> crate::Result<PollOutcome> {
        let call = self.begin(request)?;
        let channel_filter = self.resolve_filter(&call)?;
        let entries = self
            .queue
            .poll(cancel, call.params.timeout(), call.params.limit, &channel_filter)
            .await;
        Ok(self.finish(&call, entries))
    }

    /// Take whatever already matches `request` without waiting
    ///
    /// Same normalization, resolution and auditing as [`handle`](Self::handle);
    /// the timeout is ignored.
    pub fn handle_now(&self, request: &PollRequest) -> crate::Result<PollOutcome> {
        let call = self.begin(request)?;
        let channel_filter = self.resolve_filter(&call)?;
        let entries = self.queue.try_poll(call.params.limit, &channel_filter);
        Ok(self.finish(&call, entries))
    }

    fn begin(&self, request: &PollRequest) -> crate::Result<PollCall> {
        let params = PollParams::normalize(request, &self.config);
        let params_json = serde_json::to_value(&params)?;
        Ok(PollCall {
            params,
            params_json,
            started_at: Utc::now(),
            started: Instant::now(),
        })
    }

    fn record(&self, call: &PollCall, result: String) {
        audit::record(
            self.audit.as_deref(),
            AuditEntry::completed(
                POLL_TOOL,
                call.params_json.clone(),
                result,
                call.started_at,
                call.started,
            ),
        );
    }

    /// Channel id to filter on, empty for all channels
    fn resolve_filter(&self, call: &PollCall) -> crate::Result<String> {
        let channel = &call.params.channel;
        if channel.is_empty() {
            return Ok(String::new());
        }
        match resolve_channel_param(self.resolver.as_ref(), channel) {
            Ok(id) => {
                debug!(input = %channel, channel_id = %id, "Resolved channel");
                Ok(id)
            }
            Err(e) => {
                self.record(call, format!("error: {}", e));
                Err(e)
            }
        }
    }

    fn finish(&self, call: &PollCall, entries: Vec<Entry>) -> PollOutcome {
        if entries.is_empty() {
            self.record(call, "no messages".to_string());
            PollOutcome::NoMessages
        } else {
            self.record(call, format!("ok: {} messages", entries.len()));
            PollOutcome::Messages(entries)
        }
    }
}

struct PollCall {
    params: PollParams,
    params_json: serde_json::Value,
    started_at: DateTime<Utc>,
    started: Instant,
}
