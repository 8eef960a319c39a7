//! Path prefix matching.
//!
//! # Design Decisions
//! - Matching is case-sensitive
//! - A prefix only matches on a segment boundary: `/api/v1/products` matches
//!   `/api/v1/products` and `/api/v1/products/42`, never `/api/v1/productsX`
//! - No regex; a match is a single string comparison

/// Matches the request path against a mount prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a matcher. A trailing slash is ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        while prefix.len() > 1 && prefix.ends_with('/') {
            prefix.pop();
        }
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, path: &str) -> bool {
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Longer prefixes are more specific.
    pub fn specificity(&self) -> usize {
        self.prefix.len()
    }
}
