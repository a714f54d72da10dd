//! Tier 0: URL inspection. Pure, instant, no network traffic.

use url::Url;

use crate::rules::{
    MODERN_HOSTS, OBSOLETE_HOSTING, SITE_BUILDERS, SUSPICIOUS_PATHS, Verdict,
};

/// What the URL alone tells us.
#[derive(Debug, Clone)]
pub struct UrlFindings {
    pub verdict: Verdict,
    pub signals: Vec<String>,
    pub host: String,
}

/// Inspect a website URL for age indicators.
///
/// A bare domain without a scheme is treated as `https://domain`.
pub fn inspect(raw: &str) -> UrlFindings {
    let trimmed = raw.trim().to_ascii_lowercase();
    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.clone()
    } else {
        format!("https://{trimmed}")
    };

    let Ok(parsed) = Url::parse(&candidate) else {
        return UrlFindings {
            verdict: Verdict::Inconclusive,
            signals: vec!["unparseable-url".into()],
            host: String::new(),
        };
    };

    let host = parsed.host_str().unwrap_or_default().to_string();
    let path = parsed.path().to_string();
    let is_https = parsed.scheme() == "https";

    let mut signals = Vec::new();
    if !is_https {
        signals.push("plain-http".to_string());
    }

    // Obsolete hosting wins over everything else; the worst hit decides.
    let host_and_path = format!("{host}{path}");
    let hosting_hits = OBSOLETE_HOSTING.matches(&host_and_path);
    if !hosting_hits.is_empty() {
        let definitive = hosting_hits
            .iter()
            .any(|(_, v)| *v == Verdict::DefinitelyStale);
        signals.extend(hosting_hits.iter().map(|(s, _)| (*s).to_string()));
        return UrlFindings {
            verdict: if definitive {
                Verdict::DefinitelyStale
            } else {
                Verdict::LikelyStale
            },
            signals,
            host,
        };
    }

    let builder_hits = SITE_BUILDERS.matches(&host);
    if !builder_hits.is_empty() {
        signals.extend(builder_hits.iter().map(|(s, _)| (*s).to_string()));
        return UrlFindings {
            verdict: Verdict::Builder,
            signals,
            host,
        };
    }

    let modern_hits = MODERN_HOSTS.matches(&host);
    if !modern_hits.is_empty() {
        signals.extend(modern_hits.iter().map(|(s, _)| (*s).to_string()));
        return UrlFindings {
            verdict: Verdict::LikelyModern,
            signals,
            host,
        };
    }

    signals.extend(
        SUSPICIOUS_PATHS
            .matches(&path)
            .iter()
            .map(|(s, _)| (*s).to_string()),
    );

    // Plain HTTP plus at least one more smell reads as probably old.
    let verdict = if !is_https && signals.len() > 1 {
        Verdict::LikelyStale
    } else {
        Verdict::Inconclusive
    };

    UrlFindings {
        verdict,
        signals,
        host,
    }
}
