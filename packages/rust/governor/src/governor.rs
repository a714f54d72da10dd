//! The rate governor: per-domain pacing, backoff, and session budgets.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use leadscout_shared::{LaneLimits, RateLimitsConfig, StealthConfig};

/// HTTP statuses treated as transient throttling rather than hard failures.
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Whether a response status should arm backoff instead of failing outright.
pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Which pacing profile a domain belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// The primary data source. Conservative pacing, long pauses.
    Primary,
    /// Third-party business websites probed by the analyzer.
    External,
}

/// What happened with the request that a permit was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Request completed normally (any non-retryable status).
    Ok,
    /// Server pushed back with a retryable status.
    Throttled(u16),
    /// Transport-level failure (timeout, connect error, ...).
    Error,
}

/// Why a permit was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    /// The job's cancellation token fired while waiting.
    #[error("cancelled while waiting for a request permit")]
    Cancelled,
    /// The stealth session ceiling was reached; the run must wind down.
    #[error("session duration ceiling reached")]
    SessionExpired,
    /// The domain exhausted its retry budget and is skipped for the run.
    #[error("domain is degraded after repeated failures")]
    DomainDegraded,
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct DomainState {
    /// Timestamps of recent permits, for the per-minute sliding window.
    recent: VecDeque<Instant>,
    /// Total permits issued to this domain.
    request_count: u64,
    consecutive_errors: u32,
    /// Earliest time the next permit may be issued (backoff / long pause).
    not_before: Option<Instant>,
    last_permit: Option<Instant>,
    degraded: bool,
}

impl DomainState {
    fn new() -> Self {
        Self {
            recent: VecDeque::new(),
            request_count: 0,
            consecutive_errors: 0,
            not_before: None,
            last_permit: None,
            degraded: false,
        }
    }
}

#[derive(Debug)]
struct SessionState {
    started_at: Instant,
    /// Permit timestamps within the last hour, for the stealth hourly cap.
    recent_hour: VecDeque<Instant>,
}

// ---------------------------------------------------------------------------
// RateGovernor
// ---------------------------------------------------------------------------

/// Pacing authority shared by every component that touches the network.
///
/// Thread-safe: clone-free sharing via `Arc`, interior state behind mutexes.
/// No lock is held across an await point.
#[derive(Debug)]
pub struct RateGovernor {
    limits: RateLimitsConfig,
    stealth: StealthConfig,
    domains: Mutex<HashMap<String, DomainState>>,
    session: Mutex<SessionState>,
    cancel: CancellationToken,
}

impl RateGovernor {
    pub fn new(
        limits: RateLimitsConfig,
        stealth: StealthConfig,
        cancel: CancellationToken,
    ) -> Self {
        if stealth.enabled {
            info!(
                delay_min_ms = stealth.delay_min_ms,
                delay_max_ms = stealth.delay_max_ms,
                max_per_hour = stealth.max_per_hour,
                max_session_mins = stealth.max_session_mins,
                "stealth profile active"
            );
        }
        Self {
            limits,
            stealth,
            domains: Mutex::new(HashMap::new()),
            session: Mutex::new(SessionState {
                started_at: Instant::now(),
                recent_hour: VecDeque::new(),
            }),
            cancel,
        }
    }

    /// Suspend until a request to `domain` is permitted, then issue the
    /// permit. Returns an error instead of a permit when the job is
    /// cancelled, the stealth session budget is spent, or the domain has
    /// been marked degraded.
    pub async fn acquire(&self, domain: &str, lane: Lane) -> Result<(), AcquireError> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(AcquireError::Cancelled);
            }

            let wait = self.try_permit(domain, lane)?;
            let Some(wait) = wait else {
                return Ok(());
            };

            debug!(domain, wait_ms = wait.as_millis() as u64, "pacing wait");
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.cancel.cancelled() => return Err(AcquireError::Cancelled),
            }
        }
    }

    /// Record the outcome of a permitted request. Throttled and failed
    /// requests arm exponential backoff; too many in a row degrade the
    /// domain so the run skips it.
    pub fn report(&self, domain: &str, outcome: Outcome) {
        let mut domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());
        let Some(state) = domains.get_mut(domain) else {
            return;
        };

        match outcome {
            Outcome::Ok => {
                state.consecutive_errors = 0;
            }
            Outcome::Throttled(status) => {
                state.consecutive_errors += 1;
                let backoff = self.arm_backoff(domain, state);
                warn!(
                    domain,
                    status,
                    errors = state.consecutive_errors,
                    backoff_ms = backoff.as_millis() as u64,
                    "throttled, backing off"
                );
            }
            Outcome::Error => {
                state.consecutive_errors += 1;
                let backoff = self.arm_backoff(domain, state);
                warn!(
                    domain,
                    errors = state.consecutive_errors,
                    backoff_ms = backoff.as_millis() as u64,
                    "request failed, backing off"
                );
            }
        }
    }

    /// Whether the domain has been marked degraded.
    pub fn is_degraded(&self, domain: &str) -> bool {
        let domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());
        domains.get(domain).is_some_and(|s| s.degraded)
    }

    /// Total permits issued to a domain so far.
    pub fn request_count(&self, domain: &str) -> u64 {
        let domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());
        domains.get(domain).map_or(0, |s| s.request_count)
    }

    // -- internals ----------------------------------------------------------

    /// Compute the backoff for the current error streak and schedule it.
    fn arm_backoff(&self, domain: &str, state: &mut DomainState) -> Duration {
        let exp = state.consecutive_errors.saturating_sub(1).min(16);
        let backoff_ms = self
            .limits
            .backoff_base_ms
            .saturating_mul(1u64 << exp)
            .min(self.limits.backoff_cap_ms);
        let backoff = Duration::from_millis(backoff_ms);
        state.not_before = Some(Instant::now() + backoff);

        if state.consecutive_errors > self.limits.max_retries {
            state.degraded = true;
            warn!(domain, "retry budget exhausted, domain degraded");
        }
        backoff
    }

    /// Either issue a permit now (`Ok(None)`) or say how long to wait
    /// (`Ok(Some(d))`). All bookkeeping happens under the locks.
    fn try_permit(&self, domain: &str, lane: Lane) -> Result<Option<Duration>, AcquireError> {
        let now = Instant::now();
        let stealth_lane = self.stealth.enabled && lane == Lane::Primary;

        // Session-wide budgets first.
        {
            let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
            if stealth_lane {
                let ceiling =
                    Duration::from_secs(u64::from(self.stealth.max_session_mins) * 60);
                if now.duration_since(session.started_at) >= ceiling {
                    return Err(AcquireError::SessionExpired);
                }

                let hour = Duration::from_secs(3600);
                while session
                    .recent_hour
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= hour)
                {
                    session.recent_hour.pop_front();
                }
                if session.recent_hour.len() >= self.stealth.max_per_hour as usize {
                    // Wait for the oldest permit to age out of the window.
                    let oldest = session.recent_hour[0];
                    let wait = hour - now.duration_since(oldest);
                    return Ok(Some(wait));
                }
            }
        }

        let mut domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());
        let state = domains
            .entry(domain.to_string())
            .or_insert_with(DomainState::new);

        if state.degraded {
            return Err(AcquireError::DomainDegraded);
        }

        // Backoff or scheduled long pause.
        if let Some(not_before) = state.not_before {
            if now < not_before {
                return Ok(Some(not_before - now));
            }
            state.not_before = None;
        }

        let limits = self.lane_limits(lane);

        // Sliding per-minute window.
        let minute = Duration::from_secs(60);
        while state
            .recent
            .front()
            .is_some_and(|t| now.duration_since(*t) >= minute)
        {
            state.recent.pop_front();
        }
        if state.recent.len() >= limits.max_per_minute as usize {
            let oldest = state.recent[0];
            return Ok(Some(minute - now.duration_since(oldest)));
        }

        // Randomized spacing since the previous permit.
        let (delay_min, delay_max) = if stealth_lane {
            (self.stealth.delay_min_ms, self.stealth.delay_max_ms)
        } else {
            (limits.delay_min_ms, limits.delay_max_ms)
        };
        if let Some(last) = state.last_permit {
            let spacing = Duration::from_millis(jitter(delay_min, delay_max));
            let since = now.duration_since(last);
            if since < spacing {
                return Ok(Some(spacing - since));
            }
        }

        // Permit granted.
        state.request_count += 1;
        state.last_permit = Some(now);
        state.recent.push_back(now);

        if stealth_lane {
            let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
            session.recent_hour.push_back(now);
        }

        // Schedule the periodic long pause after every Nth request.
        let (pause_every, pause_min, pause_max) = if stealth_lane {
            (
                self.stealth.break_every,
                self.stealth.break_min_ms,
                self.stealth.break_max_ms,
            )
        } else {
            (limits.pause_every, limits.pause_min_ms, limits.pause_max_ms)
        };
        if pause_every > 0 && state.request_count % u64::from(pause_every) == 0 {
            let pause = Duration::from_millis(jitter(pause_min, pause_max));
            state.not_before = Some(now + pause);
            info!(
                domain,
                requests = state.request_count,
                pause_ms = pause.as_millis() as u64,
                "taking a long pause"
            );
        }

        Ok(None)
    }

    fn lane_limits(&self, lane: Lane) -> &LaneLimits {
        match lane {
            Lane::Primary => &self.limits.primary,
            Lane::External => &self.limits.external,
        }
    }
}

fn jitter(min_ms: u64, max_ms: u64) -> u64 {
    if min_ms >= max_ms {
        return min_ms;
    }
    rand::thread_rng().gen_range(min_ms..=max_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadscout_shared::config::{RateLimitsConfig, StealthConfig};

    fn fast_limits() -> RateLimitsConfig {
        RateLimitsConfig {
            primary: LaneLimits {
                delay_min_ms: 100,
                delay_max_ms: 100,
                max_per_minute: 1000,
                pause_every: 0,
                pause_min_ms: 0,
                pause_max_ms: 0,
            },
            external: LaneLimits {
                delay_min_ms: 50,
                delay_max_ms: 50,
                max_per_minute: 1000,
                pause_every: 0,
                pause_min_ms: 0,
                pause_max_ms: 0,
            },
            max_retries: 3,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 10_000,
        }
    }

    fn governor(limits: RateLimitsConfig) -> RateGovernor {
        RateGovernor::new(limits, StealthConfig::default(), CancellationToken::new())
    }

    #[tokio::test(start_paused = true)]
    async fn spacing_between_permits() {
        let gov = governor(fast_limits());
        let start = Instant::now();

        gov.acquire("example.com", Lane::Primary).await.unwrap();
        gov.acquire("example.com", Lane::Primary).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn first_permit_is_immediate() {
        let gov = governor(fast_limits());
        let start = Instant::now();
        gov.acquire("example.com", Lane::Primary).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn domains_are_paced_independently() {
        let gov = governor(fast_limits());
        let start = Instant::now();

        gov.acquire("a.example", Lane::External).await.unwrap();
        gov.acquire("b.example", Lane::External).await.unwrap();

        // No shared spacing between distinct domains.
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn per_minute_window_is_enforced() {
        let mut limits = fast_limits();
        limits.primary.delay_min_ms = 0;
        limits.primary.delay_max_ms = 0;
        limits.primary.max_per_minute = 2;
        let gov = governor(limits);

        gov.acquire("example.com", Lane::Primary).await.unwrap();
        gov.acquire("example.com", Lane::Primary).await.unwrap();

        let start = Instant::now();
        gov.acquire("example.com", Lane::Primary).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(59));
    }

    #[tokio::test(start_paused = true)]
    async fn per_minute_window_holds_across_concurrent_callers() {
        let mut limits = fast_limits();
        limits.primary.delay_min_ms = 0;
        limits.primary.delay_max_ms = 0;
        limits.primary.max_per_minute = 3;
        let gov = std::sync::Arc::new(governor(limits));

        let tasks: Vec<_> = (0..9)
            .map(|_| {
                let gov = std::sync::Arc::clone(&gov);
                tokio::spawn(async move {
                    gov.acquire("example.com", Lane::Primary).await.unwrap();
                    Instant::now()
                })
            })
            .collect();

        let mut permits = Vec::new();
        for task in tasks {
            permits.push(task.await.unwrap());
        }
        permits.sort();

        // No four permits may land inside any sliding one-minute window.
        for window in permits.windows(4) {
            assert!(window[3].duration_since(window[0]) >= Duration::from_secs(60));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn long_pause_after_every_nth_request() {
        let mut limits = fast_limits();
        limits.primary.delay_min_ms = 0;
        limits.primary.delay_max_ms = 0;
        limits.primary.pause_every = 2;
        limits.primary.pause_min_ms = 5_000;
        limits.primary.pause_max_ms = 5_000;
        let gov = governor(limits);

        gov.acquire("example.com", Lane::Primary).await.unwrap();
        gov.acquire("example.com", Lane::Primary).await.unwrap();

        let start = Instant::now();
        gov.acquire("example.com", Lane::Primary).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_and_degrades() {
        let gov = governor(fast_limits());
        gov.acquire("example.com", Lane::Primary).await.unwrap();

        gov.report("example.com", Outcome::Throttled(429));
        let start = Instant::now();
        gov.acquire("example.com", Lane::Primary).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));

        gov.report("example.com", Outcome::Throttled(503));
        let start = Instant::now();
        gov.acquire("example.com", Lane::Primary).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));

        // Exhaust the budget: 4 consecutive errors against max_retries = 3.
        gov.report("example.com", Outcome::Error);
        gov.report("example.com", Outcome::Error);
        assert!(gov.is_degraded("example.com"));
        assert_eq!(
            gov.acquire("example.com", Lane::Primary).await,
            Err(AcquireError::DomainDegraded)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_error_streak() {
        let gov = governor(fast_limits());
        gov.acquire("example.com", Lane::Primary).await.unwrap();

        gov.report("example.com", Outcome::Throttled(429));
        gov.report("example.com", Outcome::Ok);
        gov.report("example.com", Outcome::Throttled(500));

        // Streak restarted, so this is the first error again: base backoff,
        // nowhere near degraded.
        assert!(!gov.is_degraded("example.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_wait() {
        let cancel = CancellationToken::new();
        let gov = RateGovernor::new(fast_limits(), StealthConfig::default(), cancel.clone());

        gov.acquire("example.com", Lane::Primary).await.unwrap();
        cancel.cancel();
        assert_eq!(
            gov.acquire("example.com", Lane::Primary).await,
            Err(AcquireError::Cancelled)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stealth_session_ceiling() {
        let stealth = StealthConfig {
            enabled: true,
            delay_min_ms: 0,
            delay_max_ms: 0,
            break_every: 0,
            break_min_ms: 0,
            break_max_ms: 0,
            max_per_hour: 10_000,
            max_session_mins: 1,
        };
        let gov = RateGovernor::new(fast_limits(), stealth, CancellationToken::new());

        gov.acquire("example.com", Lane::Primary).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(
            gov.acquire("example.com", Lane::Primary).await,
            Err(AcquireError::SessionExpired)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stealth_hourly_cap() {
        let stealth = StealthConfig {
            enabled: true,
            delay_min_ms: 0,
            delay_max_ms: 0,
            break_every: 0,
            break_min_ms: 0,
            break_max_ms: 0,
            max_per_hour: 2,
            max_session_mins: 600,
        };
        let mut limits = fast_limits();
        limits.primary.delay_min_ms = 0;
        limits.primary.delay_max_ms = 0;
        let gov = RateGovernor::new(limits, stealth, CancellationToken::new());

        gov.acquire("example.com", Lane::Primary).await.unwrap();
        gov.acquire("example.com", Lane::Primary).await.unwrap();

        let start = Instant::now();
        gov.acquire("example.com", Lane::Primary).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(3599));
    }

    #[tokio::test(start_paused = true)]
    async fn stealth_does_not_slow_external_lane() {
        let stealth = StealthConfig {
            enabled: true,
            ..StealthConfig::default()
        };
        let gov = RateGovernor::new(fast_limits(), stealth, CancellationToken::new());

        let start = Instant::now();
        gov.acquire("shop.example", Lane::External).await.unwrap();
        gov.acquire("shop.example", Lane::External).await.unwrap();
        // External lane keeps its own short spacing under stealth.
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn retryable_statuses() {
        for status in [429, 500, 502, 503, 504] {
            assert!(is_retryable_status(status));
        }
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(200));
    }
}
