//! Escalating website freshness analysis.
//!
//! Three tiers, cheapest first: URL inspection (free), a HEAD probe, and a
//! bounded fetch of the page markup. The configured [`CheckDepth`] caps how
//! far a check may escalate; definitive evidence short-circuits early.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use leadscout_governor::{
    AcquireError, Lane, Outcome, RateGovernor, is_retryable_status, random_user_agent,
};
use leadscout_shared::{CheckDepth, CheckTier, LeadscoutError, Result, WebsiteCheck, WebsiteStatus};

use crate::header_probe::{self, HeaderFindings};
use crate::markup_scan::{self, MarkupFindings};
use crate::rules::Verdict;
use crate::url_heuristic::{self, UrlFindings};

/// How much of a page body the markup tier will read.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Per-probe request timeout. Probes are best-effort; slow sites read as
/// unknown rather than holding up the pipeline.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// FreshnessAnalyzer
// ---------------------------------------------------------------------------

/// Classifies business websites by how dated their web presence looks.
pub struct FreshnessAnalyzer {
    client: Client,
    governor: Arc<RateGovernor>,
}

impl FreshnessAnalyzer {
    pub fn new(governor: Arc<RateGovernor>) -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| LeadscoutError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, governor })
    }

    /// Classify a business's web presence.
    ///
    /// Never fails: network trouble degrades the verdict to
    /// [`WebsiteStatus::Unknown`] with the failure recorded on the check.
    /// Cost by depth: `Fast` makes no network calls, `Normal` at most one,
    /// `Thorough` at most two.
    #[instrument(skip_all, fields(url = url.unwrap_or("-"), ?depth))]
    pub async fn classify(&self, url: Option<&str>, depth: CheckDepth) -> WebsiteCheck {
        let started = Instant::now();

        let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            return WebsiteCheck {
                status: WebsiteStatus::None,
                signals: Vec::new(),
                tier: None,
                elapsed_ms: 0,
                error: None,
            };
        };

        let mut check = self.run_tiers(url, depth).await;
        check.elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(status = %check.status, signals = check.signals.len(), "classified");
        check
    }

    async fn run_tiers(&self, url: &str, depth: CheckDepth) -> WebsiteCheck {
        // Tier 0: always, free.
        let url_findings = url_heuristic::inspect(url);
        let mut signals: Vec<String> = url_findings
            .signals
            .iter()
            .map(|s| format!("url:{s}"))
            .collect();

        match url_findings.verdict {
            // Dead hosting platforms and site builders settle it outright.
            Verdict::DefinitelyStale | Verdict::Builder => {
                return finish(WebsiteStatus::Stale, signals, CheckTier::UrlOnly, None);
            }
            Verdict::LikelyModern if depth == CheckDepth::Fast => {
                return finish(WebsiteStatus::Modern, signals, CheckTier::UrlOnly, None);
            }
            Verdict::LikelyStale if depth == CheckDepth::Fast => {
                return finish(WebsiteStatus::Stale, signals, CheckTier::UrlOnly, None);
            }
            _ if depth == CheckDepth::Fast => {
                return finish(WebsiteStatus::Unknown, signals, CheckTier::UrlOnly, None);
            }
            _ => {}
        }

        // Tier 1: HEAD probe.
        let header_findings = match self.head_probe(url, &url_findings).await {
            Ok(findings) => {
                signals.extend(findings.signals.iter().map(|s| format!("header:{s}")));
                findings
            }
            Err(e) => {
                signals.push("header:probe-failed".into());
                // Unreachable plus URL-level age smells still reads as stale.
                let status = if url_findings.verdict == Verdict::LikelyStale {
                    WebsiteStatus::Stale
                } else {
                    WebsiteStatus::Unknown
                };
                return finish(status, signals, CheckTier::Header, Some(e.to_string()));
            }
        };

        if header_findings.verdict == Verdict::DefinitelyStale {
            return finish(WebsiteStatus::Stale, signals, CheckTier::Header, None);
        }

        let old_evidence = matches!(url_findings.verdict, Verdict::LikelyStale)
            || matches!(header_findings.verdict, Verdict::LikelyStale);
        let modern_evidence = matches!(url_findings.verdict, Verdict::LikelyModern)
            || matches!(header_findings.verdict, Verdict::LikelyModern);

        if depth == CheckDepth::Normal {
            let status = match (old_evidence, modern_evidence) {
                (true, false) => WebsiteStatus::Stale,
                (false, true) => WebsiteStatus::Modern,
                _ => WebsiteStatus::Unknown,
            };
            return finish(status, signals, CheckTier::Header, None);
        }

        // Tier 2: bounded markup fetch, thorough only.
        let markup_findings = match self.fetch_markup(url).await {
            Ok(findings) => {
                signals.extend(findings.signals.iter().map(|s| format!("markup:{s}")));
                findings
            }
            Err(e) => {
                signals.push("markup:fetch-failed".into());
                let status = if old_evidence && !modern_evidence {
                    WebsiteStatus::Stale
                } else {
                    WebsiteStatus::Unknown
                };
                return finish(status, signals, CheckTier::Markup, Some(e.to_string()));
            }
        };

        // A definitive markup verdict is authoritative over earlier
        // tentative evidence in either direction.
        let status = match markup_findings.verdict {
            Verdict::DefinitelyStale | Verdict::LikelyStale | Verdict::Builder => {
                WebsiteStatus::Stale
            }
            Verdict::LikelyModern => WebsiteStatus::Modern,
            Verdict::Inconclusive => match (old_evidence, modern_evidence) {
                (true, false) => WebsiteStatus::Stale,
                (false, true) => WebsiteStatus::Modern,
                _ => WebsiteStatus::Unknown,
            },
        };
        finish(status, signals, CheckTier::Markup, None)
    }

    async fn head_probe(&self, url: &str, url_findings: &UrlFindings) -> Result<HeaderFindings> {
        let target = normalize_target(url);
        self.acquire(&url_findings.host).await?;

        let request = self
            .client
            .head(&target)
            .header(reqwest::header::USER_AGENT, random_user_agent());
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                self.governor.report(&url_findings.host, Outcome::Error);
                return Err(LeadscoutError::Network(format!("HEAD {target}: {e}")));
            }
        };
        self.report_status(&url_findings.host, response.status().as_u16());

        if !response.status().is_success() {
            return Err(LeadscoutError::Network(format!(
                "HEAD {target}: status {}",
                response.status()
            )));
        }
        Ok(header_probe::analyze_headers(response.headers()))
    }

    async fn fetch_markup(&self, url: &str) -> Result<MarkupFindings> {
        let target = normalize_target(url);
        let host = url_heuristic::inspect(url).host;
        self.acquire(&host).await?;

        let request = self
            .client
            .get(&target)
            .header(reqwest::header::USER_AGENT, random_user_agent());
        let mut response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                self.governor.report(&host, Outcome::Error);
                return Err(LeadscoutError::Network(format!("GET {target}: {e}")));
            }
        };
        self.report_status(&host, response.status().as_u16());

        if !response.status().is_success() {
            return Err(LeadscoutError::Network(format!(
                "GET {target}: status {}",
                response.status()
            )));
        }

        // Read at most the prefix; the rules tolerate a truncated document.
        let mut body: Vec<u8> = Vec::with_capacity(8 * 1024);
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    body.extend_from_slice(&chunk);
                    if body.len() >= MAX_BODY_BYTES {
                        body.truncate(MAX_BODY_BYTES);
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(url = target, error = %e, "body read aborted");
                    break;
                }
            }
        }

        let html = String::from_utf8_lossy(&body);
        Ok(markup_scan::analyze_markup(&html))
    }

    async fn acquire(&self, host: &str) -> Result<()> {
        self.governor
            .acquire(host, Lane::External)
            .await
            .map_err(|e| match e {
                AcquireError::Cancelled => LeadscoutError::Cancelled,
                AcquireError::SessionExpired => LeadscoutError::SessionExpired,
                AcquireError::DomainDegraded => {
                    LeadscoutError::Network(format!("no permit for {host}: {e}"))
                }
            })
    }

    fn report_status(&self, host: &str, status: u16) {
        let outcome = if is_retryable_status(status) {
            Outcome::Throttled(status)
        } else {
            Outcome::Ok
        };
        self.governor.report(host, outcome);
    }
}

fn finish(
    status: WebsiteStatus,
    signals: Vec<String>,
    tier: CheckTier,
    error: Option<String>,
) -> WebsiteCheck {
    WebsiteCheck {
        status,
        signals,
        tier: Some(tier),
        elapsed_ms: 0,
        error,
    }
}

fn normalize_target(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}
