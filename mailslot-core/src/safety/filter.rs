//! Channel allow/deny filtering

use glob::Pattern;

enum Rule {
    Glob(Pattern),
    Literal(String),
}

impl Rule {
    fn parse(raw: &str) -> Self {
        match Pattern::new(raw) {
            Ok(pattern) => Rule::Glob(pattern),
            Err(e) => {
                tracing::warn!("Invalid channel pattern '{}', matching literally: {}", raw, e);
                Rule::Literal(raw.to_string())
            }
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            Rule::Glob(pattern) => pattern.matches(name),
            Rule::Literal(literal) => literal == name,
        }
    }
}

/// Allow/deny decision over channel names
///
/// A denylist match always denies. Otherwise an empty allowlist allows
/// everything and a non-empty one must match.
pub struct ChannelFilter {
    allow: Vec<Rule>,
    deny: Vec<Rule>,
}

impl ChannelFilter {
    pub fn new<A, D>(allowlist: A, denylist: D) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        Self {
            allow: allowlist.into_iter().map(|p| Rule::parse(p.as_ref())).collect(),
            deny: denylist.into_iter().map(|p| Rule::parse(p.as_ref())).collect(),
        }
    }

    /// Filter that allows every channel
    pub fn allow_all() -> Self {
        Self {
            allow: Vec::new(),
            deny: Vec::new(),
        }
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        if self.deny.iter().any(|rule| rule.matches(name)) {
            return false;
        }
        self.allow.is_empty() || self.allow.iter().any(|rule| rule.matches(name))
    }
}

impl Default for ChannelFilter {
    fn default() -> Self {
        Self::allow_all()
    }
}
