//! The scan pipeline: fetch, analyze, dedup, score, export, checkpoint.

use std::mem;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use leadscout_analyzer::FreshnessAnalyzer;
use leadscout_checkpoint::{Checkpoint, CheckpointStore};
use leadscout_dedupe::IdentityResolver;
use leadscout_export::{ExportMeta, Exporter};
use leadscout_governor::RateGovernor;
use leadscout_shared::{CheckDepth, Entity, LeadscoutError, Result};
use leadscout_sources::SourceAdapter;

use crate::filter::LeadFilter;
use crate::progress::{ProgressReporter, SilentProgress};

// ---------------------------------------------------------------------------
// Job state and reports
// ---------------------------------------------------------------------------

/// Phase of a scan unit. `Degraded` and `Aborted` are terminal; a degraded
/// job still completes with partial data, an aborted one stops early but
/// exports what it has first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Init,
    Fetching,
    Analyzing,
    Deduping,
    Scoring,
    Exporting,
    Done,
    Degraded,
    Aborted,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Init => "init",
            JobState::Fetching => "fetching",
            JobState::Analyzing => "analyzing",
            JobState::Deduping => "deduping",
            JobState::Scoring => "scoring",
            JobState::Exporting => "exporting",
            JobState::Done => "done",
            JobState::Degraded => "degraded",
            JobState::Aborted => "aborted",
        };
        write!(f, "{s}")
    }
}

/// One industry x city pair to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanUnit {
    pub industry: String,
    pub city: String,
}

impl ScanUnit {
    pub fn new(industry: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            industry: industry.into(),
            city: city.into(),
        }
    }

    /// Stable checkpoint key for this unit.
    pub fn key(&self) -> String {
        format!(
            "{}|{}",
            self.industry.to_lowercase(),
            self.city.to_lowercase()
        )
    }
}

/// Knobs for one job run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Result pages to fetch per unit and adapter.
    pub max_pages: u32,
    /// Stop fetching a unit once this many raw records are in (0 = no cap).
    pub limit: usize,
    /// Analyzer effort per website.
    pub depth: CheckDepth,
    /// Page-fetch attempts before a unit degrades.
    pub max_retries: u32,
    /// Wall-clock ceiling for the whole job.
    pub max_duration: Option<Duration>,
    /// Bulk mode: stop starting new units once this many leads exist
    /// (0 = scan every unit).
    pub target_leads: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_pages: 50,
            limit: 0,
            depth: CheckDepth::Normal,
            max_retries: 3,
            max_duration: None,
            target_leads: 0,
        }
    }
}

/// Outcome of one scan unit.
#[derive(Debug)]
pub struct UnitReport {
    pub unit: String,
    pub state: JobState,
    pub raw_count: usize,
    pub lead_count: usize,
    pub pages_fetched: u32,
    pub export_paths: Vec<PathBuf>,
    /// The unit was already complete and skipped entirely.
    pub skipped: bool,
}

/// Outcome of a whole job.
#[derive(Debug)]
pub struct JobReport {
    pub state: JobState,
    pub units: Vec<UnitReport>,
}

impl JobReport {
    pub fn total_leads(&self) -> usize {
        self.units.iter().map(|u| u.lead_count).sum()
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives scan units sequentially through the pipeline phases. All waiting
/// happens inside `RateGovernor::acquire`; the orchestrator itself never
/// sleeps.
pub struct Orchestrator {
    governor: Arc<RateGovernor>,
    analyzer: FreshnessAnalyzer,
    resolver: IdentityResolver,
    checkpoints: CheckpointStore,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    exporters: Vec<Box<dyn Exporter>>,
    filter: LeadFilter,
    progress: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
    options: RunOptions,
}

impl Orchestrator {
    pub fn new(
        governor: Arc<RateGovernor>,
        analyzer: FreshnessAnalyzer,
        checkpoints: CheckpointStore,
        cancel: CancellationToken,
        options: RunOptions,
    ) -> Self {
        Self {
            governor,
            analyzer,
            resolver: IdentityResolver::default(),
            checkpoints,
            adapters: Vec::new(),
            exporters: Vec::new(),
            filter: LeadFilter::default(),
            progress: Arc::new(SilentProgress),
            cancel,
            options,
        }
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn with_exporter(mut self, exporter: Box<dyn Exporter>) -> Self {
        self.exporters.push(exporter);
        self
    }

    pub fn with_filter(mut self, filter: LeadFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_resolver(mut self, resolver: IdentityResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Run every unit, resuming from the checkpoint ledger. Returns `Err`
    /// only on fatal conditions (a checkpoint that cannot be persisted);
    /// per-unit trouble degrades the unit and the job carries on.
    pub async fn run(&self, units: &[ScanUnit]) -> Result<JobReport> {
        let job_started = Instant::now();
        let mut report = JobReport {
            state: JobState::Init,
            units: Vec::with_capacity(units.len()),
        };

        for unit in units {
            let key = unit.key();

            if self
                .checkpoints
                .load(&key)
                .is_some_and(|cp| cp.done)
            {
                info!(unit = %key, "unit already complete, skipping");
                report.units.push(UnitReport {
                    unit: key,
                    state: JobState::Done,
                    raw_count: 0,
                    lead_count: 0,
                    pages_fetched: 0,
                    export_paths: Vec::new(),
                    skipped: true,
                });
                continue;
            }

            if self.options.target_leads > 0 && report.total_leads() >= self.options.target_leads {
                info!(
                    target = self.options.target_leads,
                    "lead target reached, not starting further units"
                );
                break;
            }

            let unit_report = self.run_unit(unit, job_started).await?;
            let aborted = unit_report.state == JobState::Aborted;
            report.units.push(unit_report);
            if aborted {
                break;
            }
        }

        report.state = if report.units.iter().any(|u| u.state == JobState::Aborted) {
            JobState::Aborted
        } else if report.units.iter().any(|u| u.state == JobState::Degraded) {
            JobState::Degraded
        } else {
            JobState::Done
        };

        if report.state == JobState::Done && self.checkpoints.all_done() {
            self.checkpoints.archive()?;
        }

        self.progress.job_finished(&report);
        Ok(report)
    }

    #[instrument(skip_all, fields(unit = %unit.key()))]
    async fn run_unit(&self, unit: &ScanUnit, job_started: Instant) -> Result<UnitReport> {
        let key = unit.key();
        let unit_started = Instant::now();
        let mut cp = self.checkpoints.load(&key).unwrap_or_default();
        let from_page = cp.cursor.next_page.max(1);
        self.progress.unit_started(&key, from_page);

        // Pages checkpointed by an earlier interrupted run live in the
        // ledger; picking them up here keeps a resumed run's export equal
        // to an uninterrupted one.
        let mut entities: Vec<Entity> = mem::take(&mut cp.pending);
        let mut leads = Vec::new();
        let mut export_paths = Vec::new();
        let mut degraded = false;
        let mut aborted = false;
        let mut state = JobState::Init;

        loop {
            self.progress.phase(&key, state);
            state = match state {
                JobState::Init => JobState::Fetching,
                JobState::Fetching => {
                    let fetched = self
                        .fetch_unit(unit, &key, &mut cp, &mut entities, job_started)
                        .await?;
                    degraded |= fetched.degraded;
                    aborted |= fetched.aborted;
                    JobState::Analyzing
                }
                JobState::Analyzing => {
                    for entity in entities.iter_mut() {
                        if self.should_abort(job_started) {
                            aborted = true;
                            break;
                        }
                        entity.website_check = self
                            .analyzer
                            .classify(entity.website_url.as_deref(), self.options.depth)
                            .await;
                    }
                    JobState::Deduping
                }
                JobState::Deduping => {
                    let before = entities.len();
                    entities = self.resolver.merge(mem::take(&mut entities));
                    debug!(before, after = entities.len(), "deduplicated unit");
                    JobState::Scoring
                }
                JobState::Scoring => {
                    leads = self.filter.apply(entities.clone());
                    JobState::Exporting
                }
                JobState::Exporting => {
                    let meta = ExportMeta {
                        industry: unit.industry.clone(),
                        city: unit.city.clone(),
                        sources: self.adapters.iter().map(|a| a.source()).collect(),
                        raw_count: cp.raw_count,
                        lead_count: leads.len(),
                        filters: self.filter.config().clone(),
                        exported_at: Utc::now(),
                        elapsed_secs: cp.elapsed_secs + unit_started.elapsed().as_secs(),
                    };
                    for exporter in &self.exporters {
                        match exporter.write(&leads, &meta) {
                            Ok(path) => export_paths.push(path),
                            Err(e) => {
                                error!(format = exporter.format(), error = %e, "export failed");
                                degraded = true;
                            }
                        }
                    }
                    if aborted {
                        JobState::Aborted
                    } else if degraded {
                        JobState::Degraded
                    } else {
                        JobState::Done
                    }
                }
                JobState::Done | JobState::Degraded | JobState::Aborted => break,
            };
        }

        // Only a cleanly finished unit is marked done; degraded and aborted
        // units keep their cursor and fetched records so a later run can
        // pick them back up.
        cp.lead_count = leads.len();
        cp.elapsed_secs += unit_started.elapsed().as_secs();
        cp.pending = if state == JobState::Done {
            Vec::new()
        } else {
            entities
        };
        self.checkpoints.save(&key, cp)?;
        if state == JobState::Done {
            self.checkpoints.complete(&key)?;
        }

        self.progress
            .unit_finished(&key, leads.len(), state != JobState::Done);
        info!(unit = %key, state = %state, leads = leads.len(), "unit finished");

        Ok(UnitReport {
            unit: key,
            state,
            raw_count: cp_raw_count(&self.checkpoints, unit),
            lead_count: leads.len(),
            pages_fetched: cp_pages(&self.checkpoints, unit),
            export_paths,
            skipped: false,
        })
    }

    /// Page loop for one unit across every adapter. Progress is
    /// checkpointed after each page, so interrupting mid-unit re-fetches at
    /// most the in-flight page.
    async fn fetch_unit(
        &self,
        unit: &ScanUnit,
        key: &str,
        cp: &mut Checkpoint,
        entities: &mut Vec<Entity>,
        job_started: Instant,
    ) -> Result<FetchOutcome> {
        let mut outcome = FetchOutcome::default();
        let start_page = cp.cursor.next_page.max(1);

        'adapters: for adapter in &self.adapters {
            let mut page = start_page;
            let mut failures = 0u32;

            loop {
                if self.should_abort(job_started) {
                    outcome.aborted = true;
                    break 'adapters;
                }
                if page > self.options.max_pages {
                    break;
                }
                if self.options.limit > 0 && entities.len() >= self.options.limit {
                    debug!(limit = self.options.limit, "record cap reached");
                    break 'adapters;
                }

                let listings = match adapter
                    .search_page(&self.governor, &unit.industry, &unit.city, page)
                    .await
                {
                    Ok(Some(listings)) => listings,
                    Ok(None) => {
                        debug!(adapter = adapter.name(), page, "pagination exhausted");
                        break;
                    }
                    Err(e) => {
                        if is_abort(&e) || self.cancel.is_cancelled() {
                            warn!(adapter = adapter.name(), error = %e, "run budget spent, aborting fetch");
                            outcome.aborted = true;
                            break 'adapters;
                        }
                        failures += 1;
                        warn!(
                            adapter = adapter.name(),
                            page, failures, error = %e,
                            "page fetch failed"
                        );
                        if failures > self.options.max_retries {
                            warn!(adapter = adapter.name(), "retry budget spent, unit degraded");
                            outcome.degraded = true;
                            break;
                        }
                        continue;
                    }
                };
                failures = 0;

                let mut resolved = 0usize;
                for listing in &listings {
                    if self.options.limit > 0 && entities.len() >= self.options.limit {
                        break;
                    }
                    match adapter.detail(&self.governor, listing, &unit.city).await {
                        Ok(entity) => {
                            entities.push(entity);
                            resolved += 1;
                        }
                        Err(e) if is_abort(&e) => {
                            outcome.aborted = true;
                            break 'adapters;
                        }
                        // A broken record costs that record, not the page.
                        Err(e) => {
                            warn!(name = %listing.name, error = %e, "detail fetch failed, dropping record");
                        }
                    }
                }

                self.progress.page_fetched(key, page, resolved);
                cp.pages_completed += 1;
                cp.raw_count = entities.len();
                cp.pending = entities.clone();
                cp.cursor.next_page = page + 1;
                self.checkpoints.save(key, cp.clone())?;
                page += 1;
            }
        }

        Ok(outcome)
    }

    fn should_abort(&self, job_started: Instant) -> bool {
        self.cancel.is_cancelled()
            || self
                .options
                .max_duration
                .is_some_and(|d| job_started.elapsed() >= d)
    }
}

#[derive(Debug, Default)]
struct FetchOutcome {
    degraded: bool,
    aborted: bool,
}

/// Errors that end the run rather than costing a retry: cancellation and
/// the stealth session ceiling.
fn is_abort(e: &LeadscoutError) -> bool {
    matches!(
        e,
        LeadscoutError::Cancelled | LeadscoutError::SessionExpired
    )
}

fn cp_raw_count(store: &CheckpointStore, unit: &ScanUnit) -> usize {
    store.load(&unit.key()).map(|c| c.raw_count).unwrap_or(0)
}

fn cp_pages(store: &CheckpointStore, unit: &ScanUnit) -> u32 {
    store
        .load(&unit.key())
        .map(|c| c.pages_completed)
        .unwrap_or(0)
}
