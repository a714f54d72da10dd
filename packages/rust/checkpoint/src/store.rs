//! Durable per-unit progress records with atomic writes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use leadscout_shared::{Entity, LeadscoutError, Result};

/// Where fetching resumes within a scan unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Next result page to fetch (1-based).
    pub next_page: u32,
    /// Index into the industry list for bulk runs.
    #[serde(default)]
    pub branch_index: u32,
}

/// Progress record for one scan unit (an industry x city pair).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Result pages fully processed and exported.
    pub pages_completed: u32,
    /// Raw records fetched so far.
    pub raw_count: usize,
    /// Records fetched but not yet part of a finished unit. The cursor only
    /// moves together with these, so a resumed run still holds every page
    /// it will no longer refetch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<Entity>,
    /// Leads exported so far.
    pub lead_count: usize,
    /// Accumulated wall time across runs, in seconds.
    pub elapsed_secs: u64,
    /// Last time this record was written.
    pub updated_at: Option<DateTime<Utc>>,
    /// Resume position.
    pub cursor: Cursor,
    /// The unit is finished; resuming runs skip it entirely.
    pub done: bool,
}

/// On-disk shape of the ledger file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Ledger {
    units: BTreeMap<String, Checkpoint>,
}

/// The resume ledger. All writes go through a mutex and land atomically
/// (temp file, then rename), so a crash leaves either the old or the new
/// ledger, never a torn one.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    state: Mutex<Ledger>,
}

impl CheckpointStore {
    /// Open the ledger at `path`, loading existing records. A missing file
    /// is a fresh start, not an error; an unreadable one is fatal rather
    /// than silently discarding progress.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let ledger = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| LeadscoutError::io(&path, e))?;
            let ledger: Ledger = serde_json::from_str(&content).map_err(|e| {
                LeadscoutError::Checkpoint(format!(
                    "unreadable ledger {}: {e}",
                    path.display()
                ))
            })?;
            info!(path = %path.display(), units = ledger.units.len(), "loaded resume ledger");
            ledger
        } else {
            debug!(path = %path.display(), "no ledger yet, starting fresh");
            Ledger::default()
        };

        Ok(Self {
            path,
            state: Mutex::new(ledger),
        })
    }

    /// The checkpoint for a unit, if one was recorded.
    pub fn load(&self, unit: &str) -> Option<Checkpoint> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.units.get(unit).cloned()
    }

    /// Record progress for a unit and flush the ledger to disk.
    /// Persistence failure here is fatal to the job: continuing would break
    /// the resume contract.
    pub fn save(&self, unit: &str, mut checkpoint: Checkpoint) -> Result<()> {
        checkpoint.updated_at = Some(Utc::now());
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.units.insert(unit.to_string(), checkpoint);
        self.flush(&state)
    }

    /// Mark a unit finished and flush.
    pub fn complete(&self, unit: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let entry = state.units.entry(unit.to_string()).or_default();
        entry.done = true;
        entry.updated_at = Some(Utc::now());
        self.flush(&state)
    }

    /// Whether every recorded unit is done.
    pub fn all_done(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        !state.units.is_empty() && state.units.values().all(|c| c.done)
    }

    /// Move the ledger aside after a fully successful job, so the next run
    /// starts clean while the final state stays inspectable.
    pub fn archive(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let archived = self.path.with_extension("done.json");
        std::fs::rename(&self.path, &archived)
            .map_err(|e| LeadscoutError::io(&self.path, e))?;
        info!(path = %archived.display(), "archived resume ledger");
        Ok(())
    }

    fn flush(&self, ledger: &Ledger) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| LeadscoutError::io(parent, e))?;
            }
        }

        let json = serde_json::to_string_pretty(ledger)
            .map_err(|e| LeadscoutError::Checkpoint(format!("serialize ledger: {e}")))?;

        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, json).map_err(|e| LeadscoutError::io(&temp, e))?;
        std::fs::rename(&temp, &self.path).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "ledger rename failed");
            LeadscoutError::io(&self.path, e)
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use leadscout_shared::{Address, Source, SourceId, WebsiteCheck};

    fn temp_ledger(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("leadscout-ledger-{name}-{}.json", std::process::id()))
    }

    fn entity(name: &str) -> Entity {
        Entity {
            name: name.into(),
            industry: "Friseur".into(),
            description: None,
            address: Address {
                city: "Dortmund".into(),
                ..Address::default()
            },
            phone: Some("0231 123456".into()),
            fax: None,
            email: None,
            website_url: None,
            website_check: WebsiteCheck::default(),
            rating: None,
            rating_count: None,
            opening_hours: Default::default(),
            sources: vec![SourceId::new(Source::Directory, name.to_lowercase())],
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn missing_file_is_fresh_start() {
        let path = temp_ledger("fresh");
        let _ = std::fs::remove_file(&path);
        let store = CheckpointStore::open(&path).expect("open");
        assert!(store.load("friseur|dortmund").is_none());
        assert!(!store.all_done());
    }

    #[test]
    fn save_load_roundtrip_across_reopen() {
        let path = temp_ledger("roundtrip");
        let _ = std::fs::remove_file(&path);

        let store = CheckpointStore::open(&path).expect("open");
        store
            .save(
                "friseur|dortmund",
                Checkpoint {
                    pages_completed: 3,
                    raw_count: 75,
                    pending: vec![entity("Salon Schmidt"), entity("Haarstudio Krause")],
                    lead_count: 40,
                    elapsed_secs: 120,
                    updated_at: None,
                    cursor: Cursor {
                        next_page: 4,
                        branch_index: 0,
                    },
                    done: false,
                },
            )
            .expect("save");
        drop(store);

        let reopened = CheckpointStore::open(&path).expect("reopen");
        let cp = reopened.load("friseur|dortmund").expect("checkpoint");
        assert_eq!(cp.pages_completed, 3);
        assert_eq!(cp.cursor.next_page, 4);
        assert_eq!(cp.pending.len(), 2);
        assert_eq!(cp.pending[0].name, "Salon Schmidt");
        assert!(cp.updated_at.is_some());
        assert!(!cp.done);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn complete_marks_unit_done() {
        let path = temp_ledger("complete");
        let _ = std::fs::remove_file(&path);

        let store = CheckpointStore::open(&path).expect("open");
        store.save("friseur|essen", Checkpoint::default()).expect("save");
        assert!(!store.all_done());
        store.complete("friseur|essen").expect("complete");
        assert!(store.all_done());
        assert!(store.load("friseur|essen").expect("checkpoint").done);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn corrupt_ledger_is_an_error_not_a_reset() {
        let path = temp_ledger("corrupt");
        std::fs::write(&path, "{not json").expect("write");
        let err = CheckpointStore::open(&path).expect_err("must fail");
        assert!(err.to_string().contains("checkpoint"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn archive_moves_ledger_aside() {
        let path = temp_ledger("archive");
        let _ = std::fs::remove_file(&path);

        let store = CheckpointStore::open(&path).expect("open");
        store.complete("friseur|bochum").expect("complete");
        store.archive().expect("archive");

        assert!(!path.exists());
        let archived = path.with_extension("done.json");
        assert!(archived.exists());

        let _ = std::fs::remove_file(&archived);
    }
}
