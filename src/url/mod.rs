//! URL identity and host normalization helpers
//!
//! Hosts are normalized before any comparison or storage: lowercase, no
//! port, no trailing dot, no leading `www.`. The URL hash is the hex SHA-256
//! of the final URL string and is the deduplication key throughout the
//! queue and page tables.

use sha2::{Digest, Sha256};

/// Normalizes a host for domain comparison and site identity
///
/// Lowercases, strips any `:port` suffix, a trailing dot, and a leading
/// `www.` prefix.
pub fn normalize_host(host: &str) -> String {
    let mut h = host.trim().to_lowercase();
    // IPv6 literals keep their brackets; only strip ports from host:port forms
    if !h.starts_with('[') {
        if let Some(idx) = h.rfind(':') {
            if h[idx + 1..].chars().all(|c| c.is_ascii_digit()) {
                h.truncate(idx);
            }
        }
    }
    let h = h.strip_suffix('.').unwrap_or(&h);
    let h = h.strip_prefix("www.").unwrap_or(h);
    h.to_string()
}

/// Returns true when `host` equals `site_domain` or is a subdomain of it
///
/// The subdomain check is a suffix match on `.` + domain, so
/// `notexample.com` never matches `example.com`.
pub fn is_in_domain(host: &str, site_domain: &str) -> bool {
    let h = host.trim().to_lowercase();
    let d = site_domain.trim().to_lowercase();
    h == d || h.ends_with(&format!(".{}", d))
}

/// Checks a host against a whitelist of domains (exact or subdomain match)
pub fn is_host_allowed(host: &str, whitelist: &[String]) -> bool {
    whitelist.iter().any(|d| {
        let d = d.trim();
        !d.is_empty() && is_in_domain(host, d)
    })
}

/// Hex-encoded SHA-256 of a URL string
pub fn url_hash(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host_lowercases() {
        assert_eq!(normalize_host("Example.COM"), "example.com");
    }

    #[test]
    fn test_normalize_host_strips_port() {
        assert_eq!(normalize_host("example.com:8080"), "example.com");
        assert_eq!(normalize_host("example.com:443"), "example.com");
    }

    #[test]
    fn test_normalize_host_strips_trailing_dot() {
        assert_eq!(normalize_host("example.com."), "example.com");
    }

    #[test]
    fn test_normalize_host_strips_www() {
        assert_eq!(normalize_host("www.example.com"), "example.com");
        // only the leading www. label is removed
        assert_eq!(normalize_host("wwwexample.com"), "wwwexample.com");
    }

    #[test]
    fn test_normalize_host_combined() {
        assert_eq!(normalize_host(" WWW.Example.Com.:80 "), "example.com");
    }

    #[test]
    fn test_in_domain_exact() {
        assert!(is_in_domain("example.com", "example.com"));
    }

    #[test]
    fn test_in_domain_subdomain() {
        assert!(is_in_domain("sub.example.com", "example.com"));
        assert!(is_in_domain("a.b.example.com", "example.com"));
    }

    #[test]
    fn test_in_domain_rejects_other_hosts() {
        assert!(!is_in_domain("evil.com", "example.com"));
        // suffix match must require the preceding dot
        assert!(!is_in_domain("notexample.com", "example.com"));
    }

    #[test]
    fn test_host_allowed() {
        let whitelist = vec!["example.com".to_string(), "other.org".to_string()];
        assert!(is_host_allowed("example.com", &whitelist));
        assert!(is_host_allowed("docs.other.org", &whitelist));
        assert!(!is_host_allowed("evil.com", &whitelist));
        assert!(!is_host_allowed("anything.com", &[]));
    }

    #[test]
    fn test_url_hash_is_stable_hex_sha256() {
        let h1 = url_hash("https://example.com/");
        let h2 = url_hash("https://example.com/");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, url_hash("https://example.com/other"));
    }
}
