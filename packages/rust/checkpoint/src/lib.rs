//! Resume ledger for LeadScout jobs.
//!
//! One pretty-printed JSON file holds a record per scan unit. The file is
//! meant to be read (and in a pinch, edited or deleted) by a human: losing
//! it costs duplicate fetch work, never correctness, because completed
//! pages are simply refetched on the next run.

mod store;

pub use store::{Checkpoint, CheckpointStore, Cursor};
