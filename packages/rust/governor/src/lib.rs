//! Request pacing for LeadScout.
//!
//! All outbound traffic flows through a single [`RateGovernor`]: adapters and
//! the website analyzer call [`RateGovernor::acquire`] before each request and
//! [`RateGovernor::report`] after, so pacing, backoff, and session budgets are
//! enforced in one place regardless of who is fetching.

mod governor;
mod user_agents;

pub use governor::{AcquireError, Lane, Outcome, RateGovernor, is_retryable_status};
pub use user_agents::{USER_AGENTS, random_user_agent};
