//! URL handling module for Frontier Mesh
//!
//! This module provides URL normalization and dedup keys, domain extraction,
//! restricted-pattern matching, and the scoping decision applied to every
//! discovered link.

mod domain;
mod matcher;
mod normalize;

// Re-export main functions
pub use domain::{extract_domain, same_origin};
pub use matcher::{RestrictedPattern, RestrictionSet};
pub use normalize::{dedup_key, normalize_url};

use ::url::Url;

/// Scope a link is evaluated under: where it was found and what may be followed
#[derive(Debug, Clone, Copy)]
pub struct LinkScope<'a> {
    /// Domain of the seed the crawl branch started from
    pub seed_domain: &'a str,
    /// Depth the link would be fetched at; None past the largest depth
    pub depth: Option<u32>,
    /// Maximum depth of the crawl branch
    pub depth_limit: u32,
    /// Whether links must stay on the seed domain
    pub same_origin: bool,
    pub restrictions: &'a RestrictionSet,
}

/// Outcome of evaluating a URL against a crawl scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeDecision {
    /// In scope - should be enqueued
    Admit,
    /// Different domain from the seed - counted, never fetched
    CrossDomain,
    /// Would exceed the depth limit - never enqueued
    DepthExceeded,
    /// Matches a restricted pattern - reported as restricted, never fetched
    Restricted,
}

/// Classifies a URL against a crawl scope
///
/// Checks run in this priority order:
/// 1. Same-origin (when enabled)
/// 2. Depth limit
/// 3. Restricted patterns
/// 4. Admit (default)
///
/// # Examples
///
/// ```
/// use url::Url;
/// use frontier_mesh::url::{classify_link, LinkScope, RestrictionSet, ScopeDecision};
///
/// let restrictions = RestrictionSet::default();
/// let scope = LinkScope {
///     seed_domain: "example.com",
///     depth: Some(1),
///     depth_limit: 1,
///     same_origin: true,
///     restrictions: &restrictions,
/// };
///
/// let inside = Url::parse("http://example.com/b").unwrap();
/// let outside = Url::parse("http://other.com/c").unwrap();
/// assert_eq!(classify_link(&inside, &scope), ScopeDecision::Admit);
/// assert_eq!(classify_link(&outside, &scope), ScopeDecision::CrossDomain);
/// ```
pub fn classify_link(url: &Url, scope: &LinkScope<'_>) -> ScopeDecision {
    if scope.same_origin && !same_origin(url, scope.seed_domain) {
        return ScopeDecision::CrossDomain;
    }

    match scope.depth {
        Some(depth) if depth <= scope.depth_limit => {}
        _ => return ScopeDecision::DepthExceeded,
    }

    if scope.restrictions.is_restricted(url) {
        return ScopeDecision::Restricted;
    }

    ScopeDecision::Admit
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope<'a>(restrictions: &'a RestrictionSet, depth: u32) -> LinkScope<'a> {
        LinkScope {
            seed_domain: "example.com",
            depth: Some(depth),
            depth_limit: 2,
            same_origin: true,
            restrictions,
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_admit_in_scope() {
        let restrictions = RestrictionSet::default();
        assert_eq!(
            classify_link(&url("http://example.com/page"), &scope(&restrictions, 1)),
            ScopeDecision::Admit
        );
    }

    #[test]
    fn test_cross_domain() {
        let restrictions = RestrictionSet::default();
        assert_eq!(
            classify_link(&url("http://other.com/page"), &scope(&restrictions, 1)),
            ScopeDecision::CrossDomain
        );
    }

    #[test]
    fn test_cross_domain_allowed_without_same_origin() {
        let restrictions = RestrictionSet::default();
        let mut open = scope(&restrictions, 1);
        open.same_origin = false;
        assert_eq!(
            classify_link(&url("http://other.com/page"), &open),
            ScopeDecision::Admit
        );
    }

    #[test]
    fn test_depth_exceeded() {
        let restrictions = RestrictionSet::default();
        assert_eq!(
            classify_link(&url("http://example.com/deep"), &scope(&restrictions, 3)),
            ScopeDecision::DepthExceeded
        );
        // The limit itself is still in scope
        assert_eq!(
            classify_link(&url("http://example.com/deep"), &scope(&restrictions, 2)),
            ScopeDecision::Admit
        );
    }

    #[test]
    fn test_restricted() {
        let restrictions = RestrictionSet::compile(&["*/private/*"]).unwrap();
        assert_eq!(
            classify_link(&url("http://example.com/private/x"), &scope(&restrictions, 1)),
            ScopeDecision::Restricted
        );
    }

    #[test]
    fn test_priority_cross_domain_over_restricted() {
        let restrictions = RestrictionSet::compile(&["other.com"]).unwrap();
        assert_eq!(
            classify_link(&url("http://other.com/x"), &scope(&restrictions, 1)),
            ScopeDecision::CrossDomain
        );
    }

    #[test]
    fn test_overflowed_depth_is_exceeded() {
        let restrictions = RestrictionSet::default();
        let mut deepest = scope(&restrictions, 0);
        deepest.depth = None;
        deepest.depth_limit = u32::MAX;
        assert_eq!(
            classify_link(&url("http://example.com/deep"), &deepest),
            ScopeDecision::DepthExceeded
        );
    }
}
