//! Durable record of per-animal download outcomes.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::Context;
use bestiary_table::{Catalog, DownloadStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub status: DownloadStatus,
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl DownloadRecord {
    pub fn pending() -> Self {
        Self {
            status: DownloadStatus::Pending,
            local_path: None,
            attempts: 0,
            last_error: None,
        }
    }

    pub fn placeholder() -> Self {
        Self {
            status: DownloadStatus::Placeholder,
            ..Self::pending()
        }
    }

    pub fn success(local_path: PathBuf, attempts: u32) -> Self {
        Self {
            status: DownloadStatus::Success,
            local_path: Some(local_path),
            attempts,
            last_error: None,
        }
    }

    pub fn failed(error: impl ToString, attempts: u32) -> Self {
        Self {
            status: DownloadStatus::Failed,
            local_path: None,
            attempts,
            last_error: Some(error.to_string()),
        }
    }

    /// Whether a previous run's record can stand in for a new download.
    pub fn is_reusable(&self) -> bool {
        match self.status {
            DownloadStatus::Placeholder => true,
            DownloadStatus::Success => self.local_path.as_deref().map_or(false, Path::is_file),
            DownloadStatus::Pending | DownloadStatus::Failed => false,
        }
    }
}

/// Records keyed by slug, sorted.
pub type Snapshot = BTreeMap<String, DownloadRecord>;

/// Manifest shared by the workers of one run.
#[derive(Debug, Default)]
pub struct Manifest {
    records: Mutex<Snapshot>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the pending record of a slug on its first reference.
    pub fn register(&self, slug: &str) {
        self.lock()
            .entry(slug.to_string())
            .or_insert_with(DownloadRecord::pending);
    }

    /// Stores an outcome. A record that already left pending is never overwritten.
    pub fn record(&self, slug: &str, outcome: DownloadRecord) -> bool {
        let mut records = self.lock();
        match records.get(slug) {
            Some(current) if current.status.is_terminal() => {
                log::warn!("Ignoring second outcome for {slug}, already {:?}", current.status);
                false
            }
            _ => {
                records.insert(slug.to_string(), outcome);
                true
            }
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().clone()
    }

    /// Loads a persisted snapshot, a missing file being an empty one.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Snapshot> {
        let path = path.as_ref();
        let raw = match fs_err::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Snapshot::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    pub fn save(snapshot: &Snapshot, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs_err::write(&tmp, serde_json::to_string_pretty(snapshot)?)?;
        fs_err::rename(&tmp, path)?;
        log::info!("Saved {} records to {}", snapshot.len(), path.display());
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Snapshot> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Copies the outcomes of a snapshot onto the catalog entries.
pub fn apply(catalog: &mut Catalog, snapshot: &Snapshot) -> usize {
    catalog.apply(
        snapshot
            .iter()
            .map(|(slug, r)| (slug.as_str(), r.status, r.local_path.as_deref())),
    )
}
