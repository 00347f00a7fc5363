use url::Url;

/// Extracts the domain from a URL
///
/// Returns the lowercase host, or None when the URL has no host.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use newz::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Strips a leading `www.` from a host
pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Returns the brand of a source, e.g. `cnn` for `edition.cnn.com`
///
/// The brand is the label right before the public suffix. Only single-label
/// suffixes plus the common `co.uk`-style pairs are recognised; that is enough
/// to name a source in logs and memo files.
pub fn brand(domain: &str) -> String {
    let labels: Vec<&str> = strip_www(domain).split('.').filter(|l| !l.is_empty()).collect();
    match labels.len() {
        0 => String::new(),
        1 => labels[0].to_string(),
        n => {
            let second_level = labels[n - 2];
            if n >= 3 && matches!(second_level, "co" | "com" | "org" | "net" | "ac" | "gov") {
                labels[n - 3].to_string()
            } else {
                second_level.to_string()
            }
        }
    }
}

/// Checks whether `candidate` is the same site as `domain` or one of its subdomains
///
/// A leading `www.` is ignored on both sides.
pub fn is_same_site(domain: &str, candidate: &str) -> bool {
    let domain = strip_www(domain);
    let candidate = strip_www(candidate);
    candidate == domain || candidate.ends_with(&format!(".{}", domain))
}

/// Builds the per-user feed url for medium.com author pages
///
/// `https://medium.com/@someone/some-post` maps to `https://medium.com/feed/@someone`.
pub fn medium_user_feed(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    if host != "medium.com" && host != "www.medium.com" {
        return None;
    }

    let user = url
        .path_segments()?
        .next()
        .filter(|segment| segment.starts_with('@') && segment.len() > 1)?;

    Some(format!("{}://{}/feed/{}", url.scheme(), host, user))
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
        let url = Url::parse("https://example.com:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_mixed_case() {
        let url = Url::parse("https://Example.COM/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_brand() {
        assert_eq!(brand("www.cnn.com"), "cnn");
        assert_eq!(brand("edition.cnn.com"), "cnn");
        assert_eq!(brand("bbc.co.uk"), "bbc");
        assert_eq!(brand("news.bbc.co.uk"), "bbc");
        assert_eq!(brand("localhost"), "localhost");
    }

    #[test]
    fn test_is_same_site() {
        assert!(is_same_site("cnn.com", "cnn.com"));
        assert!(is_same_site("www.cnn.com", "cnn.com"));
        assert!(is_same_site("cnn.com", "money.cnn.com"));
        assert!(!is_same_site("cnn.com", "notcnn.com"));
        assert!(!is_same_site("money.cnn.com", "cnn.com"));
    }

    #[test]
    fn test_medium_user_feed() {
        let url = Url::parse("https://medium.com/@writer/a-post-123").unwrap();
        assert_eq!(
            medium_user_feed(&url),
            Some("https://medium.com/feed/@writer".to_string())
        );

        let url = Url::parse("https://medium.com/topics").unwrap();
        assert_eq!(medium_user_feed(&url), None);

        let url = Url::parse("https://example.com/@writer").unwrap();
        assert_eq!(medium_user_feed(&url), None);
    }
}
