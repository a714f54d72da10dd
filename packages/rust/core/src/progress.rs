//! Progress callbacks for long-running scans.

use crate::orchestrator::{JobReport, JobState};

/// Observer for scan progress. All methods have no-op defaults, so
/// implementations override only what they display.
pub trait ProgressReporter: Send + Sync {
    /// A scan unit is starting; `from_page` > 1 means it resumed.
    fn unit_started(&self, _unit: &str, _from_page: u32) {}

    /// The unit moved to a new phase.
    fn phase(&self, _unit: &str, _state: JobState) {}

    /// One result page was fetched and resolved.
    fn page_fetched(&self, _unit: &str, _page: u32, _records: usize) {}

    /// The unit finished (possibly with partial data).
    fn unit_finished(&self, _unit: &str, _leads: usize, _degraded: bool) {}

    /// The whole job finished.
    fn job_finished(&self, _report: &JobReport) {}
}

/// Reporter that displays nothing. The default for library use.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {}
