use url::Url;

/// Resolves a link href against a base URL
///
/// Returns None if the link should be excluded:
/// - empty or fragment-only hrefs
/// - javascript:, mailto:, tel:, data: schemes
/// - hrefs that do not resolve
/// - anything that is not HTTP(S) after resolution
///
/// The fragment of the resolved URL is dropped so that `/a#top` and `/a` are the
/// same article.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use newz::url::prepare_url;
///
/// let base = Url::parse("https://example.com/world/").unwrap();
/// assert_eq!(
///     prepare_url("story-one#comments", &base),
///     Some("https://example.com/world/story-one".to_string())
/// );
/// assert_eq!(prepare_url("mailto:desk@example.com", &base), None);
/// ```
pub fn prepare_url(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }

    absolute_url.set_fragment(None);
    Some(absolute_url.to_string())
}
