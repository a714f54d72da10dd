//! Lead output writers.
//!
//! An [`Exporter`] takes the finished leads of one scan unit plus run
//! metadata and writes a file, returning its path. Writers land their
//! output atomically (temp file, then rename) so a crash never leaves a
//! half-written export behind.

mod csv;
mod json;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use leadscout_shared::{FilterConfig, Lead, Result, Source};

pub use csv::CsvExporter;
pub use json::JsonExporter;

/// Run metadata written alongside the leads.
#[derive(Debug, Clone, Serialize)]
pub struct ExportMeta {
    /// Search term the unit was scanned for.
    pub industry: String,
    /// City the unit was scanned in.
    pub city: String,
    /// Sources that contributed records.
    pub sources: Vec<Source>,
    /// Raw records fetched before dedup and filtering.
    pub raw_count: usize,
    /// Leads that survived dedup and filtering.
    pub lead_count: usize,
    /// Filter criteria that produced this lead set.
    pub filters: FilterConfig,
    /// When the export was written.
    pub exported_at: DateTime<Utc>,
    /// Wall time of the scan unit, in seconds.
    pub elapsed_secs: u64,
}

/// A lead output format.
pub trait Exporter: Send + Sync {
    /// File extension / format name for logs ("json", "csv").
    fn format(&self) -> &'static str;

    /// Write the leads and return the path of the file written.
    fn write(&self, leads: &[Lead], meta: &ExportMeta) -> Result<PathBuf>;
}

/// Filesystem-safe file stem for a scan unit, e.g. `leads_friseur_dortmund`.
pub(crate) fn file_stem(meta: &ExportMeta) -> String {
    format!(
        "leads_{}_{}_{}",
        slug(&meta.industry),
        slug(&meta.city),
        meta.exported_at.format("%Y%m%d_%H%M%S")
    )
}

fn slug(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use leadscout_shared::{Address, Entity, SourceId, WebsiteCheck};

    pub(crate) fn sample_lead(name: &str) -> Lead {
        Lead::from_entity(Entity {
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
            phone: None,
            fax: None,
            email: None,
            website_url: None,
            website_check: WebsiteCheck::default(),
            rating: None,
            rating_count: None,
            opening_hours: Default::default(),
            sources: vec![SourceId::new(Source::Directory, "fixture")],
            fetched_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap(),
        })
    }

    pub(crate) fn sample_meta(lead_count: usize) -> ExportMeta {
        ExportMeta {
            industry: "Friseur".into(),
            city: "Dortmund".into(),
            sources: vec![Source::Directory],
            raw_count: lead_count + 1,
            lead_count,
            filters: FilterConfig::default(),
            exported_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 31, 0).unwrap(),
            elapsed_secs: 42,
        }
    }

    #[test]
    fn file_stems_are_filesystem_safe() {
        let meta = ExportMeta {
            industry: "Kfz Werkstatt".into(),
            ..sample_meta(0)
        };
        let stem = file_stem(&meta);
        assert_eq!(stem, "leads_kfz-werkstatt_dortmund_20260314_093100");
    }
}
