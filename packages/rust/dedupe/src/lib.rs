//! Cross-source deduplication for LeadScout.
//!
//! Pure and deterministic: no I/O, no clock, no randomness. Given the same
//! input order, [`IdentityResolver::merge`] always produces the same output.

pub mod normalize;
pub mod resolver;

pub use normalize::{name_bucket, name_similarity, normalize_name, normalize_phone,
    normalize_postal, phones_match};
pub use resolver::{DedupKey, IdentityResolver};
