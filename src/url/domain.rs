use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// The port is not part of the domain, so `example.com:8080` and `example.com`
/// are the same origin for scoping purposes.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use frontier_mesh::url::extract_domain;
///
/// let url = Url::parse("https://example.com/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("https://sub.example.com/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("sub.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if `candidate` belongs to the same origin as `seed_domain`
pub fn same_origin(candidate: &Url, seed_domain: &str) -> bool {
    extract_domain(candidate).map_or(false, |domain| domain == seed_domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("http://127.0.0.1:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("127.0.0.1".to_string()));
    }

    #[test]
    fn test_extract_uppercase_converted_to_lowercase() {
        let url = Url::parse("https://Example.COM/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_same_origin() {
        let url = Url::parse("http://example.com/b").unwrap();
        assert!(same_origin(&url, "example.com"));

        let other = Url::parse("http://other.com/c").unwrap();
        assert!(!same_origin(&other, "example.com"));

        // A subdomain is a different origin
        let sub = Url::parse("http://blog.example.com/").unwrap();
        assert!(!same_origin(&sub, "example.com"));
    }
}
