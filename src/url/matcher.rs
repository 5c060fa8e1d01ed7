use crate::ConfigError;
use regex::Regex;
use url::Url;

/// A single operator-supplied restriction, compiled to an anchored regex
#[derive(Debug, Clone)]
pub struct RestrictedPattern {
    source: String,
    regex: Regex,
}

impl RestrictedPattern {
    /// Compiles one restricted pattern
    ///
    /// Patterns are literal URLs or domains where `*` is the only wildcard:
    ///
    /// - every other regex metacharacter is escaped and `*` becomes `.*`
    /// - a bare domain (no scheme, no path, no wildcard) expands to
    ///   `scheme://domain/.*`, matching both `http` and `https`
    /// - a pattern without a scheme that does not start with `*` gets an
    ///   `http(s)://` prefix so it can match a full URL
    /// - a wildcard pattern naming only a host (no `/` after the scheme, no
    ///   trailing `*`) gets a `/.*` suffix, so `*.ads.com` covers its pages
    /// - the result is anchored at both ends
    ///
    /// # Examples
    ///
    /// ```
    /// use frontier_mesh::url::RestrictedPattern;
    ///
    /// let pattern = RestrictedPattern::compile("ads.example.com").unwrap();
    /// assert_eq!(pattern.regex_str(), r"^https?://ads\.example\.com/.*$");
    ///
    /// let pattern = RestrictedPattern::compile("*/login*").unwrap();
    /// assert!(pattern.is_match("https://example.com/login?next=/"));
    ///
    /// let pattern = RestrictedPattern::compile("*.ads.com").unwrap();
    /// assert!(pattern.is_match("http://x.ads.com/banner"));
    /// ```
    pub fn compile(pattern: &str) -> Result<Self, ConfigError> {
        let source = pattern.trim();
        if source.is_empty() {
            return Err(ConfigError::InvalidPattern(
                "Restricted pattern cannot be empty".to_string(),
            ));
        }

        let has_scheme = source.contains("://");
        let location = source.split_once("://").map_or(source, |(_, rest)| rest);
        let host_only = !location.contains('/');

        let expression = if !has_scheme && host_only && !source.contains('*') {
            format!("^https?://{}/.*$", regex::escape(source))
        } else {
            let mut body = source
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*");
            if host_only && !source.ends_with('*') {
                body.push_str("/.*");
            }

            if has_scheme || source.starts_with('*') {
                format!("^{}$", body)
            } else {
                format!("^https?://{}$", body)
            }
        };

        let regex = Regex::new(&expression)
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", source, e)))?;

        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// The pattern as written by the operator
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The compiled regular expression
    pub fn regex_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }
}

/// The full set of restricted patterns a crawl runs under
#[derive(Debug, Clone, Default)]
pub struct RestrictionSet {
    patterns: Vec<RestrictedPattern>,
}

impl RestrictionSet {
    /// Compiles every pattern, failing on the first invalid one
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| RestrictedPattern::compile(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Returns the first pattern matching the URL, if any
    pub fn find_match(&self, url: &Url) -> Option<&RestrictedPattern> {
        self.patterns.iter().find(|p| p.is_match(url.as_str()))
    }

    pub fn is_restricted(&self, url: &Url) -> bool {
        self.find_match(url).is_some()
    }

    pub fn patterns(&self) -> &[RestrictedPattern] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_bare_domain_expands() {
        let pattern = RestrictedPattern::compile("ads.example.com").unwrap();
        assert!(pattern.is_match("http://ads.example.com/"));
        assert!(pattern.is_match("https://ads.example.com/banner/1"));
        assert!(!pattern.is_match("https://example.com/"));
        assert!(!pattern.is_match("https://adsxexample.com/"));
    }

    #[test]
    fn test_wildcard_host_covers_its_pages() {
        let pattern = RestrictedPattern::compile("*.ads.com").unwrap();
        assert_eq!(pattern.regex_str(), r"^.*\.ads\.com/.*$");
        assert!(pattern.is_match("http://x.ads.com/banner"));
        assert!(pattern.is_match("https://a.b.ads.com/"));
        assert!(!pattern.is_match("https://ads.company.com/"));

        let pattern = RestrictedPattern::compile("https://*.ads.com").unwrap();
        assert!(pattern.is_match("https://x.ads.com/banner"));
        assert!(!pattern.is_match("http://x.ads.com/banner"));

        let pattern = RestrictedPattern::compile("tracker.*.net").unwrap();
        assert!(pattern.is_match("http://tracker.eu.net/pixel.gif"));
    }

    #[test]
    fn test_trailing_wildcard_is_left_open() {
        let pattern = RestrictedPattern::compile("*login*").unwrap();
        assert_eq!(pattern.regex_str(), "^.*login.*$");
        assert!(pattern.is_match("http://example.com/login"));
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let pattern = RestrictedPattern::compile("http://example.com/a?b=(1)").unwrap();
        assert!(pattern.is_match("http://example.com/a?b=(1)"));
        assert!(!pattern.is_match("http://example.com/ab=1"));
    }

    #[test]
    fn test_wildcard_becomes_dot_star() {
        let pattern = RestrictedPattern::compile("http://example.com/private/*").unwrap();
        assert_eq!(pattern.regex_str(), r"^http://example\.com/private/.*$");
        assert!(pattern.is_match("http://example.com/private/x/y"));
        assert!(!pattern.is_match("http://example.com/public/x"));
    }

    #[test]
    fn test_leading_wildcard() {
        let pattern = RestrictedPattern::compile("*/login*").unwrap();
        assert!(pattern.is_match("http://example.com/login"));
        assert!(pattern.is_match("https://other.org/account/login?next=1"));
        assert!(!pattern.is_match("https://example.com/logout"));
    }

    #[test]
    fn test_schemeless_path_pattern() {
        let pattern = RestrictedPattern::compile("example.com/cart/*").unwrap();
        assert!(pattern.is_match("https://example.com/cart/42"));
        assert!(!pattern.is_match("https://example.com/shop"));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(RestrictedPattern::compile("   ").is_err());
    }

    #[test]
    fn test_restriction_set() {
        let set = RestrictionSet::compile(&["ads.example.com", "*/admin/*"]).unwrap();
        assert!(set.is_restricted(&url("http://ads.example.com/x")));
        assert!(set.is_restricted(&url("http://example.com/admin/users")));
        assert!(!set.is_restricted(&url("http://example.com/b")));
        assert_eq!(
            set.find_match(&url("http://example.com/admin/")).unwrap().source(),
            "*/admin/*"
        );
    }

    #[test]
    fn test_empty_set_restricts_nothing() {
        let set = RestrictionSet::compile::<String>(&[]).unwrap();
        assert!(set.is_empty());
        assert!(!set.is_restricted(&url("http://example.com/")));
    }
}
