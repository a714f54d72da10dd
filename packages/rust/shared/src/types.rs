//! Core domain types for LeadScout discovery runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// A business-data source the pipeline can fetch from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// A paginated business directory (the primary source).
    Directory,
    /// A maps/places provider (secondary source).
    Maps,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Directory => write!(f, "directory"),
            Source::Maps => write!(f, "maps"),
        }
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "directory" => Ok(Source::Directory),
            "maps" => Ok(Source::Maps),
            other => Err(format!("unknown source: {other}")),
        }
    }
}

/// A record identifier scoped to the source it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId {
    /// Which source produced the record.
    pub source: Source,
    /// The source-local identifier (detail URL, place id, ...).
    pub id: String,
}

impl SourceId {
    pub fn new(source: Source, id: impl Into<String>) -> Self {
        Self {
            source,
            id: id.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A postal address. Only the city is guaranteed to be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Street name without the house number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    /// House number, kept as text ("12a", "3-5").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub house_number: Option<String>,
    /// Five-digit postal code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// City or municipality.
    pub city: String,
    /// State / region, when the source provides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Address {
    /// Single-line rendering for display and CSV output.
    pub fn format_full(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        match (&self.street, &self.house_number) {
            (Some(street), Some(no)) => parts.push(format!("{street} {no}")),
            (Some(street), None) => parts.push(street.clone()),
            _ => {}
        }
        match &self.postal_code {
            Some(plz) => parts.push(format!("{plz} {}", self.city)),
            None => parts.push(self.city.clone()),
        }
        parts.join(", ")
    }

    /// Whether both street and postal code are known.
    pub fn is_complete(&self) -> bool {
        self.street.is_some() && self.postal_code.is_some()
    }

    /// Whether any component beyond the city is known.
    pub fn is_partial(&self) -> bool {
        self.street.is_some() || self.postal_code.is_some()
    }
}

/// Extract a five-digit postal code from free-form address text.
pub fn extract_postal_code(text: &str) -> Option<String> {
    let mut run = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            run.push(ch);
            if run.len() > 5 {
                run.clear();
            }
        } else {
            if run.len() == 5 {
                return Some(run);
            }
            run.clear();
        }
    }
    (run.len() == 5).then_some(run)
}

// ---------------------------------------------------------------------------
// Website freshness
// ---------------------------------------------------------------------------

/// Classification of a business's web presence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebsiteStatus {
    /// No website URL is known for the business.
    None,
    /// The site shows strong signs of being outdated or abandoned.
    Stale,
    /// The site appears actively maintained on a current stack.
    Modern,
    /// Checks ran but the evidence was inconclusive or the site unreachable.
    Unknown,
    /// No check was attempted.
    #[default]
    Unchecked,
}

impl WebsiteStatus {
    /// Relative confidence used when merging duplicate records: a definite
    /// verdict beats an inconclusive one, which beats no attempt at all.
    pub fn confidence_rank(self) -> u8 {
        match self {
            WebsiteStatus::Stale | WebsiteStatus::Modern | WebsiteStatus::None => 2,
            WebsiteStatus::Unknown => 1,
            WebsiteStatus::Unchecked => 0,
        }
    }
}

impl std::fmt::Display for WebsiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WebsiteStatus::None => "none",
            WebsiteStatus::Stale => "stale",
            WebsiteStatus::Modern => "modern",
            WebsiteStatus::Unknown => "unknown",
            WebsiteStatus::Unchecked => "unchecked",
        };
        write!(f, "{s}")
    }
}

/// The deepest analysis tier that ran for a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckTier {
    /// URL inspection only, no network traffic.
    UrlOnly,
    /// HEAD request and response-header analysis.
    Header,
    /// Bounded fetch of the page body and markup analysis.
    Markup,
}

/// How much effort the analyzer may spend per site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckDepth {
    /// URL heuristics only; zero network calls.
    Fast,
    /// Escalate to a header probe when the URL is inconclusive.
    Normal,
    /// Also scan the page markup when headers don't settle it.
    Thorough,
}

impl std::str::FromStr for CheckDepth {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(CheckDepth::Fast),
            "normal" => Ok(CheckDepth::Normal),
            "thorough" => Ok(CheckDepth::Thorough),
            other => Err(format!("unknown check depth: {other}")),
        }
    }
}

/// Outcome of a website freshness check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsiteCheck {
    /// Final classification.
    pub status: WebsiteStatus,
    /// Human-readable evidence, each prefixed with the tier that saw it
    /// (`url:`, `header:`, `markup:`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signals: Vec<String>,
    /// Deepest tier that ran, if any ran at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<CheckTier>,
    /// Wall time spent on the check in milliseconds.
    #[serde(default)]
    pub elapsed_ms: u64,
    /// Network failure description when the check degraded to unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for WebsiteCheck {
    fn default() -> Self {
        Self {
            status: WebsiteStatus::Unchecked,
            signals: Vec::new(),
            tier: None,
            elapsed_ms: 0,
            error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Listings and entities
// ---------------------------------------------------------------------------

/// A minimally-parsed search result row, before the detail fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawListing {
    /// Business name as shown in the result list.
    pub name: String,
    /// Link to the detail page; doubles as the source-local id.
    pub detail_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_count: Option<u32>,
}

/// A fully-resolved business record. Name and city are always present;
/// everything else is best-effort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub industry: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fax: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    /// Result of the freshness check; defaults to unchecked.
    #[serde(default)]
    pub website_check: WebsiteCheck,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_count: Option<u32>,
    /// Opening hours keyed by day range ("Mo-Fr" => "09:00-18:00").
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub opening_hours: BTreeMap<String, String>,
    /// Every source record that contributed to this entity.
    pub sources: Vec<SourceId>,
    /// When the record was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl Entity {
    /// Completeness score in 0..=100. More contactable, better-described
    /// businesses score higher.
    pub fn quality_score(&self) -> u8 {
        let mut score = 0u32;
        if self.phone.is_some() {
            score += 20;
        }
        if self.email.is_some() {
            score += 25;
        }
        if self.website_url.is_some() {
            score += 15;
        }
        if self.address.is_complete() {
            score += 15;
        } else if self.address.is_partial() {
            score += 7;
        }
        if self.rating.is_some() {
            score += 10;
        }
        if !self.opening_hours.is_empty() {
            score += 5;
        }
        if self.description.is_some() {
            score += 10;
        }
        score.min(100) as u8
    }
}

// ---------------------------------------------------------------------------
// Lead
// ---------------------------------------------------------------------------

/// A deduplicated, filtered, scored business record — the pipeline's output
/// unit. Created only after dedup and filtering have run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    #[serde(flatten)]
    pub entity: Entity,
    /// Quality score at export time.
    pub score: u8,
}

impl Lead {
    pub fn from_entity(entity: Entity) -> Self {
        let score = entity.quality_score();
        Self { entity, score }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entity() -> Entity {
        Entity {
            name: "Salon Schmidt".into(),
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
            website_check: WebsiteCheck::default(),
            rating: None,
            rating_count: None,
            opening_hours: BTreeMap::new(),
            sources: vec![SourceId::new(Source::Directory, "salon-schmidt")],
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn address_formatting() {
        let addr = Address {
            street: Some("Hauptstraße".into()),
            house_number: Some("12".into()),
            postal_code: Some("44135".into()),
            city: "Dortmund".into(),
            region: None,
        };
        assert_eq!(addr.format_full(), "Hauptstraße 12, 44135 Dortmund");

        let city_only = Address {
            city: "Essen".into(),
            ..Default::default()
        };
        assert_eq!(city_only.format_full(), "Essen");
        assert!(!city_only.is_partial());
    }

    #[test]
    fn postal_code_extraction() {
        assert_eq!(
            extract_postal_code("Hauptstraße 12, 44135 Dortmund"),
            Some("44135".into())
        );
        assert_eq!(extract_postal_code("Hauptstraße 12, Dortmund"), None);
        // Six-digit runs are not postal codes.
        assert_eq!(extract_postal_code("Tel 441353"), None);
    }

    #[test]
    fn quality_score_weights() {
        let entity = sample_entity();
        // phone 20 + complete address 15
        assert_eq!(entity.quality_score(), 35);

        let mut rich = sample_entity();
        rich.email = Some("info@salon-schmidt.de".into());
        rich.website_url = Some("https://salon-schmidt.de".into());
        rich.rating = Some(4.5);
        rich.description = Some("Friseursalon im Zentrum".into());
        rich.opening_hours.insert("Mo-Fr".into(), "09:00-18:00".into());
        assert_eq!(rich.quality_score(), 100);
    }

    #[test]
    fn partial_address_scores_lower() {
        let mut entity = sample_entity();
        entity.address.street = None;
        // phone 20 + partial address 7
        assert_eq!(entity.quality_score(), 27);
    }

    #[test]
    fn website_status_confidence_ordering() {
        assert!(
            WebsiteStatus::Stale.confidence_rank() > WebsiteStatus::Unknown.confidence_rank()
        );
        assert!(
            WebsiteStatus::Unknown.confidence_rank() > WebsiteStatus::Unchecked.confidence_rank()
        );
        assert_eq!(
            WebsiteStatus::Modern.confidence_rank(),
            WebsiteStatus::None.confidence_rank()
        );
    }

    #[test]
    fn entity_serialization_roundtrip() {
        let entity = sample_entity();
        let json = serde_json::to_string_pretty(&entity).expect("serialize");
        let parsed: Entity = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.name, "Salon Schmidt");
        assert_eq!(parsed.website_check.status, WebsiteStatus::Unchecked);
        assert_eq!(parsed.sources.len(), 1);
    }

    #[test]
    fn lead_flattens_entity_fields() {
        let lead = Lead::from_entity(sample_entity());
        let json = serde_json::to_value(&lead).expect("serialize");
        assert_eq!(json["name"], "Salon Schmidt");
        assert_eq!(json["score"], 35);
    }
}
