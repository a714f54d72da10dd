//! Cross-source identity resolution.
//!
//! Records from different sources describing the same business are folded
//! into one entity. Matching is conservative: an exact phone match merges
//! unconditionally; otherwise candidates share a name bucket and postal
//! code and must pass a fuzzy name check.

use std::collections::HashMap;

use tracing::{debug, instrument};

use leadscout_shared::Entity;

use crate::normalize::{name_bucket, name_similarity, normalize_phone, normalize_postal, phones_match};

/// The identity key an entity is blocked under during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    /// First significant token of the normalized name.
    pub name_bucket: String,
    /// Normalized national phone digits, when known.
    pub phone: Option<String>,
    /// Five-digit postal code, when known.
    pub postal: Option<String>,
}

impl DedupKey {
    pub fn for_entity(entity: &Entity) -> Self {
        Self {
            name_bucket: name_bucket(&entity.name),
            phone: entity
                .phone
                .as_deref()
                .map(normalize_phone)
                .filter(|p| !p.is_empty()),
            postal: entity
                .address
                .postal_code
                .as_deref()
                .and_then(normalize_postal),
        }
    }
}

/// Deterministic, order-stable entity merger.
pub struct IdentityResolver {
    name_threshold: f64,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self {
            name_threshold: 0.85,
        }
    }
}

impl IdentityResolver {
    pub fn new(name_threshold: f64) -> Self {
        Self { name_threshold }
    }

    /// Fold duplicate records into single entities.
    ///
    /// First occurrence wins on conflicting values; later records fill
    /// empty fields and contribute their source ids. Output preserves
    /// first-seen order, and resolving an already-resolved list is a
    /// no-op.
    #[instrument(skip_all, fields(input = entities.len()))]
    pub fn merge(&self, entities: Vec<Entity>) -> Vec<Entity> {
        let mut resolved: Vec<Entity> = Vec::with_capacity(entities.len());
        let mut by_phone: HashMap<String, usize> = HashMap::new();
        let mut by_bucket: HashMap<(String, String), Vec<usize>> = HashMap::new();

        for incoming in entities {
            let key = DedupKey::for_entity(&incoming);

            let target = self.find_match(&key, &incoming, &resolved, &by_phone, &by_bucket);
            match target {
                Some(idx) => {
                    debug!(name = %incoming.name, into = %resolved[idx].name, "merging duplicate");
                    merge_into(&mut resolved[idx], incoming);
                    // The merge may have filled in a phone number; index it.
                    let merged_key = DedupKey::for_entity(&resolved[idx]);
                    if let Some(phone) = merged_key.phone {
                        by_phone.entry(phone).or_insert(idx);
                    }
                }
                None => {
                    let idx = resolved.len();
                    resolved.push(incoming);
                    if let Some(phone) = &key.phone {
                        by_phone.entry(phone.clone()).or_insert(idx);
                    }
                    if let Some(postal) = &key.postal {
                        by_bucket
                            .entry((key.name_bucket.clone(), postal.clone()))
                            .or_default()
                            .push(idx);
                    }
                }
            }
        }

        resolved
    }

    fn find_match(
        &self,
        key: &DedupKey,
        incoming: &Entity,
        resolved: &[Entity],
        by_phone: &HashMap<String, usize>,
        by_bucket: &HashMap<(String, String), Vec<usize>>,
    ) -> Option<usize> {
        // A shared phone number is as definite as identity gets here.
        if let Some(phone) = &key.phone {
            if let Some(&idx) = by_phone.get(phone) {
                return Some(idx);
            }
            // Containment matches (with/without area code) need a scan of
            // candidates in the same name bucket.
            if let Some(postal) = &key.postal {
                if let Some(candidates) = by_bucket.get(&(key.name_bucket.clone(), postal.clone()))
                {
                    for &idx in candidates {
                        if let Some(other_phone) = &resolved[idx].phone {
                            if phones_match(
                                incoming.phone.as_deref().unwrap_or_default(),
                                other_phone,
                            ) {
                                return Some(idx);
                            }
                        }
                    }
                }
            }
        }

        // Same name bucket and postal code, confirmed by fuzzy name match.
        let postal = key.postal.as_ref()?;
        let candidates = by_bucket.get(&(key.name_bucket.clone(), postal.clone()))?;
        candidates.iter().copied().find(|&idx| {
            name_similarity(&incoming.name, &resolved[idx].name) >= self.name_threshold
        })
    }
}

/// Fold `other` into `primary`. First-seen values win; `other` fills gaps,
/// contributes its sources, and can upgrade the website check.
fn merge_into(primary: &mut Entity, other: Entity) {
    if primary.phone.is_none() {
        primary.phone = other.phone;
    }
    if primary.fax.is_none() {
        primary.fax = other.fax;
    }
    if primary.email.is_none() {
        primary.email = other.email;
    }
    if primary.website_url.is_none() {
        primary.website_url = other.website_url;
    }
    if primary.description.is_none() {
        primary.description = other.description;
    }
    if primary.opening_hours.is_empty() {
        primary.opening_hours = other.opening_hours;
    }

    if primary.address.street.is_none() {
        primary.address.street = other.address.street;
    }
    if primary.address.house_number.is_none() {
        primary.address.house_number = other.address.house_number;
    }
    if primary.address.postal_code.is_none() {
        primary.address.postal_code = other.address.postal_code;
    }
    if primary.address.region.is_none() {
        primary.address.region = other.address.region;
    }

    // Ratings: average when both sides rated, otherwise take the one that
    // exists. Review counts take the maximum.
    primary.rating = match (primary.rating, other.rating) {
        (Some(a), Some(b)) => Some((a + b) / 2.0),
        (a, b) => a.or(b),
    };
    primary.rating_count = match (primary.rating_count, other.rating_count) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };

    // Keep the more confident website verdict.
    if other.website_check.status.confidence_rank()
        > primary.website_check.status.confidence_rank()
    {
        primary.website_check = other.website_check;
    }

    for source in other.sources {
        if !primary.sources.contains(&source) {
            primary.sources.push(source);
        }
    }
}
