//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for mailslot
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Gateway credentials and guild scope
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Message queue settings
    #[serde(default)]
    pub queue: QueueConfig,
    /// Channel filtering and destructive-tool confirmation
    #[serde(default)]
    pub safety: SafetyConfig,
    /// Audit log settings
    #[serde(default)]
    pub audit: AuditConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub auth_token: String,
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            auth_token: String::new(),
        }
    }
}

/// Gateway credentials and guild scope
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatewayConfig {
    #[serde(default)]
    pub token: String,
    /// Only messages from this guild are queued
    #[serde(default)]
    pub guild_id: String,
}

/// Message queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum queued messages (0 selects the built-in default)
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    /// Poll timeout used when a request does not give one
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    /// Upper bound for requested poll timeouts
    #[serde(default = "default_max_poll_timeout")]
    pub max_poll_timeout_secs: u64,
    /// Result limit used when a request does not give one
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

fn default_max_size() -> usize {
    crate::queue::DEFAULT_CAPACITY
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_max_poll_timeout() -> u64 {
    300
}

fn default_limit() -> usize {
    50
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            poll_timeout_secs: default_poll_timeout(),
            max_poll_timeout_secs: default_max_poll_timeout(),
            default_limit: default_limit(),
        }
    }
}

/// Channel allow/deny lists (shell-style globs)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelListsConfig {
    #[serde(default)]
    pub allowlist: Vec<String>,
    #[serde(default)]
    pub denylist: Vec<String>,
}

/// Safety settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default)]
    pub channels: ChannelListsConfig,
    /// Tools that need a confirmation token before running
    #[serde(default = "default_destructive_tools")]
    pub destructive_tools: Vec<String>,
}

fn default_destructive_tools() -> Vec<String> {
    vec!["discord_delete_message".to_string()]
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            channels: ChannelListsConfig::default(),
            destructive_tools: default_destructive_tools(),
        }
    }
}

/// Audit log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_audit_path")]
    pub log_path: String,
}

fn default_true() -> bool {
    true
}

fn default_audit_path() -> String {
    "audit.log".to_string()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: default_audit_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}
