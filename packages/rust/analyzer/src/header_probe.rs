//! Tier 1: response-header analysis for the HEAD probe.

use reqwest::header::HeaderMap;

use crate::rules::{MODERN_STACKS, OLD_PLATFORMS, OLD_SERVERS, SECURITY_HEADERS, Verdict};

/// What the response headers tell us.
#[derive(Debug, Clone)]
pub struct HeaderFindings {
    pub verdict: Verdict,
    pub signals: Vec<String>,
    /// How many of the usual security headers were present (0-7).
    pub security_score: u32,
}

/// Analyze the headers of a HEAD response.
pub fn analyze_headers(headers: &HeaderMap) -> HeaderFindings {
    let mut signals = Vec::new();
    let mut old_hits = 0u32;
    let mut definitive_old = false;
    let mut modern_hits = 0u32;

    let server = header_str(headers, "server");
    let powered_by = header_str(headers, "x-powered-by");

    for (signal, verdict) in OLD_SERVERS.matches(&server) {
        signals.push(signal.to_string());
        old_hits += 1;
        definitive_old |= verdict == Verdict::DefinitelyStale;
    }
    for (signal, verdict) in OLD_PLATFORMS.matches(&powered_by) {
        signals.push(signal.to_string());
        old_hits += 1;
        definitive_old |= verdict == Verdict::DefinitelyStale;
    }

    for banner in [&server, &powered_by] {
        for (signal, _) in MODERN_STACKS.matches(banner) {
            if !signals.iter().any(|s| s == signal) {
                signals.push(signal.to_string());
                modern_hits += 1;
            }
        }
    }

    // CDN / platform fingerprints beyond the banner headers.
    if headers.contains_key("cf-ray") || headers.contains_key("cf-cache-status") {
        signals.push("modern-cloudflare-cdn".into());
        modern_hits += 1;
    }
    if headers.contains_key("x-vercel-id") {
        signals.push("modern-vercel-edge".into());
        modern_hits += 1;
    }
    if headers.contains_key("x-nf-request-id") {
        signals.push("modern-netlify-edge".into());
        modern_hits += 1;
    }

    let security_score = SECURITY_HEADERS
        .iter()
        .filter(|h| headers.contains_key(**h))
        .count() as u32;
    if security_score == 0 {
        signals.push("no-security-headers".into());
    } else if security_score >= 4 {
        signals.push("security-headers-present".into());
    }

    // Smaller smells that only count in aggregate.
    if !headers.contains_key("cache-control") {
        signals.push("no-cache-control".into());
    }
    if header_str(headers, "pragma") == "no-cache" {
        signals.push("pragma-no-cache".into());
    }
    let content_type = header_str(headers, "content-type");
    if content_type.contains("text/html") && !content_type.contains("charset") {
        signals.push("html-without-charset".into());
    }
    if let Some(version) = headers.get("x-aspnet-version").and_then(|v| v.to_str().ok()) {
        if version.starts_with(['1', '2', '3']) {
            signals.push("aspnet-version-old".into());
            old_hits += 1;
        }
    }

    let verdict = if definitive_old {
        Verdict::DefinitelyStale
    } else if old_hits >= 2 || (old_hits >= 1 && security_score == 0) {
        Verdict::LikelyStale
    } else if old_hits == 1 {
        Verdict::LikelyStale
    } else if modern_hits > 0 || security_score >= 4 {
        Verdict::LikelyModern
    } else {
        Verdict::Inconclusive
    };

    HeaderFindings {
        verdict,
        signals,
        security_score,
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                name.parse::<HeaderName>().unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn ancient_apache_is_definitive() {
        let findings = analyze_headers(&headers(&[("server", "Apache/1.3.29 (Unix)")]));
        assert_eq!(findings.verdict, Verdict::DefinitelyStale);
        assert!(findings.signals.iter().any(|s| s == "server-apache-1"));
    }

    #[test]
    fn old_php_is_definitive() {
        let findings = analyze_headers(&headers(&[
            ("server", "Apache/2.4.52"),
            ("x-powered-by", "PHP/5.2.17"),
        ]));
        assert_eq!(findings.verdict, Verdict::DefinitelyStale);
    }

    #[test]
    fn old_server_without_security_headers_is_likely_stale() {
        let findings = analyze_headers(&headers(&[("server", "Apache/2.2.3 (CentOS)")]));
        assert_eq!(findings.verdict, Verdict::LikelyStale);
        assert!(findings.signals.iter().any(|s| s == "no-security-headers"));
    }

    #[test]
    fn modern_stack_with_security_headers() {
        let findings = analyze_headers(&headers(&[
            ("server", "nginx/1.25.3"),
            ("strict-transport-security", "max-age=63072000"),
            ("content-security-policy", "default-src 'self'"),
            ("x-content-type-options", "nosniff"),
            ("x-frame-options", "DENY"),
            ("cache-control", "no-store"),
        ]));
        assert_eq!(findings.verdict, Verdict::LikelyModern);
        assert!(findings.security_score >= 4);
    }

    #[test]
    fn cdn_fingerprints_count_as_modern() {
        let findings = analyze_headers(&headers(&[
            ("cf-ray", "8a1b2c3d4e5f-FRA"),
            ("cache-control", "max-age=3600"),
        ]));
        assert_eq!(findings.verdict, Verdict::LikelyModern);
    }

    #[test]
    fn bare_headers_are_inconclusive() {
        let findings = analyze_headers(&headers(&[(
            "content-type",
            "text/html; charset=utf-8",
        )]));
        assert_eq!(findings.verdict, Verdict::Inconclusive);
    }
}
