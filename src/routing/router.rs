//! Route group composition and lookup.
//!
//! # Responsibilities
//! - Mount each collaborator's sub-router under its prefix
//! - Reject duplicate or malformed prefixes while the group is built
//! - Resolve a path to the mount that owns it (longest prefix wins)
//! - Treat a trailing slash on a mounted path like its absence
//!
//! # Design Decisions
//! - Immutable after construction
//! - Explicit `None` for unmatched paths; the fallback decides the response

use axum::Router;

use crate::http::response::not_found;
use crate::routing::matcher::PathPrefixMatcher;

/// Errors raised while building a [`RouterGroup`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("prefix {0:?} is already mounted")]
    Duplicate(String),

    #[error("prefix {0:?} must start with '/' and name at least one segment")]
    InvalidPrefix(String),
}

/// Read-only view of the mounted prefixes, ordered most specific first.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    matchers: Vec<PathPrefixMatcher>,
}

impl RouteTable {
    /// Mount prefix owning `path`, if any.
    pub fn resolve(&self, path: &str) -> Option<&str> {
        self.matchers
            .iter()
            .find(|m| m.matches(path))
            .map(PathPrefixMatcher::prefix)
    }

    /// `path` without its trailing slash, when a mount owns it.
    pub fn trim_trailing_slash<'a>(&self, path: &'a str) -> Option<&'a str> {
        let trimmed = path.strip_suffix('/')?;
        (!trimmed.is_empty() && self.resolve(path).is_some()).then_some(trimmed)
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.matchers.iter().map(PathPrefixMatcher::prefix)
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

/// Named sub-routers mounted under distinct prefixes.
#[derive(Default)]
pub struct RouterGroup {
    table: RouteTable,
    mounts: Vec<(PathPrefixMatcher, Router)>,
}

impl RouterGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `router` under `prefix`.
    pub fn mount(mut self, prefix: &str, router: Router) -> Result<Self, RouteError> {
        let matcher = PathPrefixMatcher::new(prefix);
        if !matcher.prefix().starts_with('/') || matcher.prefix() == "/" {
            return Err(RouteError::InvalidPrefix(prefix.to_string()));
        }
        if self.table.matchers.contains(&matcher) {
            return Err(RouteError::Duplicate(matcher.prefix().to_string()));
        }

        tracing::debug!(prefix = %matcher.prefix(), "Mounted route group");
        self.table.matchers.push(matcher.clone());
        self.table
            .matchers
            .sort_by_key(|m| std::cmp::Reverse(m.specificity()));
        self.mounts.push((matcher, router));
        Ok(self)
    }

    pub fn table(&self) -> RouteTable {
        self.table.clone()
    }

    /// Flatten into one axum router.
    ///
    /// A known path with an unsupported method answers like an unknown path.
    pub fn into_router(self) -> Router {
        self.mounts
            .into_iter()
            .fold(Router::new(), |app, (matcher, router)| {
                app.nest(
                    matcher.prefix(),
                    router.method_not_allowed_fallback(not_found),
                )
            })
    }
}
