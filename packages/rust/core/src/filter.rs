//! Lead filtering and scoring.

use leadscout_shared::{Entity, FilterConfig, Lead};

/// Decides which deduplicated entities become leads.
///
/// The criteria come straight from the `[filters]` config section: an
/// allow-set of website statuses, a minimum quality score, and optional
/// hard requirements on contact data.
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    config: FilterConfig,
}

impl LeadFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// The criteria this filter applies, for export metadata.
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Whether an entity passes every criterion.
    pub fn matches(&self, entity: &Entity) -> bool {
        let status = entity.website_check.status.to_string();
        if !self
            .config
            .include_statuses
            .iter()
            .any(|s| s.eq_ignore_ascii_case(&status))
        {
            return false;
        }
        if entity.quality_score() < self.config.min_quality {
            return false;
        }
        if self.config.require_phone && entity.phone.is_none() {
            return false;
        }
        if self.config.require_email && entity.email.is_none() {
            return false;
        }
        if self.config.require_address && !entity.address.is_partial() {
            return false;
        }
        true
    }

    /// Filter, score, and sort: best leads first, name as the tiebreak so
    /// output order is deterministic.
    pub fn apply(&self, entities: Vec<Entity>) -> Vec<Lead> {
        let mut leads: Vec<Lead> = entities
            .into_iter()
            .filter(|e| self.matches(e))
            .map(Lead::from_entity)
            .collect();
        leads.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.entity.name.cmp(&b.entity.name))
        });
        leads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use leadscout_shared::{Address, Source, SourceId, WebsiteCheck, WebsiteStatus};

    fn entity(name: &str, status: WebsiteStatus) -> Entity {
        Entity {
            name: name.into(),
            industry: "Friseur".into(),
            description: None,
            address: Address {
                street: Some("Hauptstraße".into()),
                house_number: Some("12".into()),
                postal_code: Some("44135".into()),
                city: "Dortmund".into(),
                region: None,
            },
            phone: Some("0231 123456".into()),
            fax: None,
            email: None,
            website_url: None,
            website_check: WebsiteCheck {
                status,
                ..WebsiteCheck::default()
            },
            rating: None,
            rating_count: None,
            opening_hours: Default::default(),
            sources: vec![SourceId::new(Source::Directory, name.to_string())],
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn default_filter_excludes_modern_sites() {
        let filter = LeadFilter::default();
        assert!(filter.matches(&entity("a", WebsiteStatus::None)));
        assert!(filter.matches(&entity("b", WebsiteStatus::Stale)));
        assert!(filter.matches(&entity("c", WebsiteStatus::Unknown)));
        assert!(filter.matches(&entity("d", WebsiteStatus::Unchecked)));
        assert!(!filter.matches(&entity("e", WebsiteStatus::Modern)));
    }

    #[test]
    fn include_modern_opens_the_allow_set() {
        let filter = LeadFilter::new(FilterConfig {
            include_statuses: vec!["modern".into(), "stale".into()],
            ..FilterConfig::default()
        });
        assert!(filter.matches(&entity("a", WebsiteStatus::Modern)));
        assert!(!filter.matches(&entity("b", WebsiteStatus::None)));
    }

    #[test]
    fn hard_requirements() {
        let filter = LeadFilter::new(FilterConfig {
            require_email: true,
            ..FilterConfig::default()
        });
        let mut e = entity("a", WebsiteStatus::None);
        assert!(!filter.matches(&e));
        e.email = Some("info@example.de".into());
        assert!(filter.matches(&e));
    }

    #[test]
    fn min_quality_cutoff() {
        // phone 20 + complete address 15 = 35
        let filter = LeadFilter::new(FilterConfig {
            min_quality: 36,
            ..FilterConfig::default()
        });
        assert!(!filter.matches(&entity("a", WebsiteStatus::None)));

        let filter = LeadFilter::new(FilterConfig {
            min_quality: 35,
            ..FilterConfig::default()
        });
        assert!(filter.matches(&entity("a", WebsiteStatus::None)));
    }

    #[test]
    fn apply_sorts_best_first_with_stable_ties() {
        let mut rich = entity("Zeta", WebsiteStatus::None);
        rich.email = Some("info@zeta.de".into());
        let plain_b = entity("Beta", WebsiteStatus::None);
        let plain_a = entity("Alpha", WebsiteStatus::None);

        let leads = LeadFilter::default().apply(vec![plain_b, rich, plain_a]);
        let names: Vec<&str> = leads.iter().map(|l| l.entity.name.as_str()).collect();
        assert_eq!(names, ["Zeta", "Alpha", "Beta"]);
    }
}
