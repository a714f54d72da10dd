//! Scan orchestration for LeadScout.
//!
//! This crate ties the pipeline together: source adapters feed raw
//! listings through the rate governor, the analyzer classifies websites,
//! the resolver merges duplicates, the filter scores and selects leads,
//! and exporters write the result. Progress is checkpointed so an
//! interrupted job resumes where it stopped.

mod filter;
mod orchestrator;
mod progress;

pub use filter::LeadFilter;
pub use orchestrator::{JobReport, JobState, Orchestrator, RunOptions, ScanUnit, UnitReport};
pub use progress::{ProgressReporter, SilentProgress};
