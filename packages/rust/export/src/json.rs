//! Pretty-printed JSON export: a `meta` block followed by the leads.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use leadscout_shared::{Lead, LeadscoutError, Result};

use crate::{Exporter, ExportMeta, file_stem};

/// Writes one JSON document per scan unit.
pub struct JsonExporter {
    output_dir: PathBuf,
}

#[derive(Serialize)]
struct Document<'a> {
    meta: &'a ExportMeta,
    leads: &'a [Lead],
}

impl JsonExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl Exporter for JsonExporter {
    fn format(&self) -> &'static str {
        "json"
    }

    fn write(&self, leads: &[Lead], meta: &ExportMeta) -> Result<PathBuf> {
        let path = self.output_dir.join(format!("{}.json", file_stem(meta)));
        let document = Document { meta, leads };
        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| LeadscoutError::Export(format!("serialize leads: {e}")))?;

        write_atomic(&path, json.as_bytes())?;
        info!(path = %path.display(), leads = leads.len(), "wrote JSON export");
        Ok(path)
    }
}

/// Write via a temp file and rename, so readers never see a torn file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| LeadscoutError::io(parent, e))?;
        }
    }
    let temp = path.with_extension("tmp");
    std::fs::write(&temp, bytes).map_err(|e| LeadscoutError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| LeadscoutError::io(path, e))?;
    Ok(())
}
