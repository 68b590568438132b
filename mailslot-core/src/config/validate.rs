//! Configuration validation rules.

use super::schema::Config;

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    let queue = &config.queue;
    if queue.poll_timeout_secs == 0 {
        errors.push("queue.poll_timeout_secs must be > 0".to_string());
    }
    if queue.max_poll_timeout_secs == 0 {
        errors.push("queue.max_poll_timeout_secs must be > 0".to_string());
    }
    if queue.poll_timeout_secs > queue.max_poll_timeout_secs {
        errors.push(
            "queue.poll_timeout_secs must not exceed queue.max_poll_timeout_secs".to_string(),
        );
    }
    if queue.default_limit == 0 {
        errors.push("queue.default_limit must be > 0".to_string());
    }

    if config.audit.enabled && config.audit.log_path.trim().is_empty() {
        errors.push("audit.log_path is required when audit is enabled".to_string());
    }

    let format = config.logging.format.to_ascii_lowercase();
    if format != "text" && format != "json" {
        errors.push(format!(
            "logging.format must be \"text\" or \"json\", got \"{}\"",
            config.logging.format
        ));
    }

    let lists = [
        ("safety.channels.allowlist", &config.safety.channels.allowlist),
        ("safety.channels.denylist", &config.safety.channels.denylist),
    ];
    for (name, patterns) in lists {
        for pattern in patterns {
            if let Err(e) = glob::Pattern::new(pattern) {
                errors.push(format!("{} has invalid pattern '{}': {}", name, pattern, e));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_defaults() {
        validate_config(&Config::default()).unwrap();
    }

    #[test]
    fn test_validate_rejects_default_timeout_above_max() {
        let mut config = Config::default();
        config.queue.poll_timeout_secs = 600;

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("queue.poll_timeout_secs"));
    }

    #[test]
    fn test_validate_aggregates_errors() {
        let mut config = Config::default();
        config.queue.default_limit = 0;
        config.audit.log_path = "  ".to_string();
        config.logging.format = "xml".to_string();

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("queue.default_limit"));
        assert!(message.contains("audit.log_path"));
        assert!(message.contains("logging.format"));
    }

    #[test]
    fn test_validate_rejects_bad_glob() {
        let mut config = Config::default();
        config.safety.channels.denylist = vec!["[oops".to_string()];

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("safety.channels.denylist"));
    }

    #[test]
    fn test_disabled_audit_allows_empty_path() {
        let mut config = Config::default();
        config.audit.enabled = false;
        config.audit.log_path.clear();
        validate_config(&config).unwrap();
    }
}
