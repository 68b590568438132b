//! Append-only JSON-lines audit log

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

/// One audited tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub tool: String,
    /// Request parameters; `null` when the tool took none
    #[serde(default)]
    pub params: serde_json::Value,
    pub result: String,
    pub duration_ms: u64,
}

impl AuditEntry {
    /// Entry for a call that began at `started` (wall clock `started_at`)
    pub fn completed(
        tool: impl Into<String>,
        params: serde_json::Value,
        result: impl Into<String>,
        started_at: DateTime<Utc>,
        started: Instant,
    ) -> Self {
        Self {
            timestamp: started_at,
            tool: tool.into(),
            params,
            result: result.into(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Writes one JSON object per line to the wrapped sink
pub struct AuditLogger {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl AuditLogger {
    pub fn new<W>(sink: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            sink: Mutex::new(Box::new(sink)),
        }
    }

    /// Open `path` for appending, creating it owner-only if missing
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(path)?;
        Ok(Self::new(file))
    }

    /// Append `entry` as a single line
    pub fn log(&self, entry: &AuditEntry) -> crate::Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        let mut sink = self.sink.lock();
        sink.write_all(&line)?;
        sink.flush()?;
        Ok(())
    }
}

/// Log to `audit` when one is configured; failures are reported, not returned
pub fn record(audit: Option<&AuditLogger>, entry: AuditEntry) {
    let Some(audit) = audit else {
        return;
    };
    if let Err(e) = audit.log(&entry) {
        tracing::warn!(tool = %entry.tool, "Failed to write audit entry: {}", e);
    }
}
