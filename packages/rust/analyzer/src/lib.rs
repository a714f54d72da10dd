//! Website freshness analysis for LeadScout.
//!
//! Answers one question per business: does its web presence look absent,
//! dated, or current? The answer drives lead qualification — a business with
//! no site or a visibly old one is the target customer.
//!
//! Analysis escalates through three tiers of increasing cost:
//! 1. URL inspection (free, no network)
//! 2. HEAD probe of the homepage
//! 3. Bounded fetch and markup scan
//!
//! The rule tables live in [`rules`]; the tiers are pure functions over
//! their inputs, and [`FreshnessAnalyzer`] wires them to the network and
//! the rate governor.

pub mod header_probe;
pub mod markup_scan;
pub mod rules;
pub mod scanner;
pub mod url_heuristic;

pub use scanner::FreshnessAnalyzer;
