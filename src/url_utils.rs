//! URL helpers for link resolution and host matching.

use url::Url;

/// Schemes that never produce a crawlable link.
const NON_NAVIGABLE_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Parse an absolute `http`/`https` URL with a host.
///
/// # Returns
/// * `Some(Url)` if valid absolute URL, `None` otherwise
#[must_use]
pub fn parse_absolute(s: &str) -> Option<Url> {
    let s = s.trim();
    let url = Url::parse(s).ok()?;
    if matches!(url.scheme(), "http" | "https") && url.host().is_some() {
        Some(url)
    } else {
        None
    }
}

/// Resolve a link target found in markup against `base`.
///
/// Returns `None` for empty targets, fragment-only targets, non-navigable
/// schemes and anything that does not resolve to `http`/`https`.
#[must_use]
pub fn resolve_link(target: &str, base: &Url) -> Option<Url> {
    let target = target.trim();
    if target.is_empty() || target.starts_with('#') {
        return None;
    }

    let lower = target.to_ascii_lowercase();
    if NON_NAVIGABLE_SCHEMES
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let resolved = base.join(target).ok()?;
    if matches!(resolved.scheme(), "http" | "https") && resolved.host().is_some() {
        Some(resolved)
    } else {
        None
    }
}

/// Lowercase host of an absolute URL.
#[must_use]
pub fn host_of(url_str: &str) -> Option<String> {
    parse_absolute(url_str).and_then(|url| url.host_str().map(str::to_ascii_lowercase))
}

/// True when `host` is `domain` or one of its subdomains.
///
/// A leading `.` or `www.` on `domain` is ignored.
#[must_use]
pub fn host_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
    let domain = domain.strip_prefix("www.").unwrap_or(&domain);
    if domain.is_empty() {
        return false;
    }
    let host = host.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// True for links that only point at an in-page anchor of a directory,
/// i.e. the serialized URL ends with `/#`.
#[must_use]
pub fn is_hash_directory_link(url: &str) -> bool {
    url.ends_with("/#")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/shop/list.html").expect("base")
    }

    #[test]
    fn test_parse_absolute() {
        assert!(parse_absolute("https://example.com").is_some());
        assert!(parse_absolute("  http://example.com/a  ").is_some());
        assert!(parse_absolute("ftp://example.com").is_none());
        assert!(parse_absolute("/relative").is_none());
        assert!(parse_absolute("").is_none());
    }

    #[test]
    fn test_resolve_link_relative() {
        assert_eq!(
            resolve_link("item/42", &base()).map(String::from),
            Some("https://example.com/shop/item/42".to_string())
        );
        assert_eq!(
            resolve_link("//cdn.example.com/a", &base()).map(String::from),
            Some("https://cdn.example.com/a".to_string())
        );
        assert_eq!(
            resolve_link("/#", &base()).map(String::from),
            Some("https://example.com/#".to_string())
        );
    }

    #[test]
    fn test_resolve_link_drops_non_navigable() {
        for target in ["#top", "javascript:void(0)", "MAILTO:a@b.c", "tel:123", "data:x", "  "] {
            assert!(resolve_link(target, &base()).is_none(), "{target}");
        }
        assert!(resolve_link("ftp://files.example.com/", &base()).is_none());
    }

    #[test]
    fn test_host_matches() {
        assert!(host_matches("example.com", "example.com"));
        assert!(host_matches("shop.example.com", "example.com"));
        assert!(host_matches("www.example.com", "www.example.com"));
        assert!(host_matches("example.com", ".example.com"));
        assert!(!host_matches("notexample.com", "example.com"));
        assert!(!host_matches("example.com.evil.test", "example.com"));
        assert!(!host_matches("example.com", ""));
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://Shop.Example.com/x").as_deref(), Some("shop.example.com"));
        assert_eq!(host_of("not a url"), None);
    }

    #[test]
    fn test_hash_directory_link() {
        assert!(is_hash_directory_link("https://example.com/list/#"));
        assert!(!is_hash_directory_link("https://example.com/list#top"));
    }
}
