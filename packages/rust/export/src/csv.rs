//! Semicolon-separated CSV export with a UTF-8 BOM.
//!
//! The separator and BOM are for spreadsheet tools in locales where the
//! comma is the decimal mark; without the BOM they guess the encoding wrong.

use std::path::PathBuf;

use tracing::info;

use leadscout_shared::{Lead, Result};

use crate::json::write_atomic;
use crate::{Exporter, ExportMeta, file_stem};

const SEPARATOR: char = ';';
const BOM: &str = "\u{feff}";

const HEADER: &[&str] = &[
    "name",
    "industry",
    "street",
    "house_number",
    "postal_code",
    "city",
    "phone",
    "fax",
    "email",
    "website",
    "website_status",
    "website_signals",
    "rating",
    "rating_count",
    "opening_hours",
    "description",
    "sources",
    "score",
    "fetched_at",
];

/// Writes one CSV file per scan unit, one row per lead.
pub struct CsvExporter {
    output_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl Exporter for CsvExporter {
    fn format(&self) -> &'static str {
        "csv"
    }

    fn write(&self, leads: &[Lead], meta: &ExportMeta) -> Result<PathBuf> {
        let path = self.output_dir.join(format!("{}.csv", file_stem(meta)));

        let mut out = String::with_capacity(leads.len() * 160 + 256);
        out.push_str(BOM);
        push_row(&mut out, HEADER.iter().map(|h| h.to_string()));
        for lead in leads {
            push_row(&mut out, lead_fields(lead));
        }

        write_atomic(&path, out.as_bytes())?;
        info!(path = %path.display(), leads = leads.len(), "wrote CSV export");
        Ok(path)
    }
}

fn lead_fields(lead: &Lead) -> impl Iterator<Item = String> {
    let e = &lead.entity;
    let opening_hours = e
        .opening_hours
        .iter()
        .map(|(day, times)| format!("{day} {times}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sources = e
        .sources
        .iter()
        .map(|s| s.source.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    [
        e.name.clone(),
        e.industry.clone(),
        e.address.street.clone().unwrap_or_default(),
        e.address.house_number.clone().unwrap_or_default(),
        e.address.postal_code.clone().unwrap_or_default(),
        e.address.city.clone(),
        e.phone.clone().unwrap_or_default(),
        e.fax.clone().unwrap_or_default(),
        e.email.clone().unwrap_or_default(),
        e.website_url.clone().unwrap_or_default(),
        e.website_check.status.to_string(),
        e.website_check.signals.join(", "),
        e.rating.map(|r| r.to_string()).unwrap_or_default(),
        e.rating_count.map(|c| c.to_string()).unwrap_or_default(),
        opening_hours,
        e.description.clone().unwrap_or_default(),
        sources,
        lead.score.to_string(),
        e.fetched_at.to_rfc3339(),
    ]
    .into_iter()
}

fn push_row(out: &mut String, fields: impl Iterator<Item = String>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(SEPARATOR);
        }
        first = false;
        out.push_str(&escape(&field));
    }
    out.push_str("\r\n");
}

/// Quote a field when it contains the separator, a quote, or a line break.
fn escape(field: &str) -> String {
    if field.contains([SEPARATOR, '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{sample_lead, sample_meta};

    #[test]
    fn escaping_rules() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a;b"), "\"a;b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn csv_starts_with_bom_and_header() {
        let dir = std::env::temp_dir().join(format!("leadscout-csv-{}", std::process::id()));
        let exporter = CsvExporter::new(&dir);

        let mut lead = sample_lead("Bäckerei Müller; Filiale Mitte");
        lead.entity.phone = Some("0231 123456".into());
        let path = exporter.write(&[lead], &sample_meta(1)).expect("write");

        let content = std::fs::read_to_string(&path).expect("read back");
        assert!(content.starts_with(BOM));

        let lines: Vec<&str> = content.trim_start_matches(BOM).lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("name;industry;street"));
        // Name contains the separator, so it must come out quoted.
        assert!(lines[1].starts_with("\"Bäckerei Müller; Filiale Mitte\";"));
        assert!(lines[1].contains("0231 123456"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn row_has_one_field_per_header_column() {
        let dir = std::env::temp_dir().join(format!("leadscout-csv-cols-{}", std::process::id()));
        let exporter = CsvExporter::new(&dir);
        let path = exporter
            .write(&[sample_lead("Salon Schmidt")], &sample_meta(1))
            .expect("write");

        let content = std::fs::read_to_string(&path).expect("read back");
        let lines: Vec<&str> = content.trim_start_matches(BOM).lines().collect();
        // No quoted fields in this fixture, so counting separators is safe.
        let header_cols = lines[0].split(SEPARATOR).count();
        let row_cols = lines[1].split(SEPARATOR).count();
        assert_eq!(header_cols, HEADER.len());
        assert_eq!(row_cols, header_cols);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
