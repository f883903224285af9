//! Snapshot store for airspace-copilot.
//!
//! The store holds the latest [`RegionSnapshot`] of every known region. A
//! snapshot is only ever replaced as a whole: readers clone an `Arc` and keep
//! a complete snapshot for as long as they need it, no matter how often the
//! ingestion side swaps in a new one. A replacement that fails validation is
//! rejected and the previous snapshot keeps serving.

pub mod file;
pub mod payload;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::flight::RegionSnapshot;

pub use file::write_snapshot;
pub use payload::parse_snapshot;

/// Read access to region snapshots.
///
/// This is the seam between the query layer and wherever snapshots live. The
/// read is treated as a suspension point so callers can bound it with a
/// timeout.
#[async_trait]
pub trait SnapshotSource: Send + Sync + std::fmt::Debug {
    /// Get the latest complete snapshot of a region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegionNotFound`] if the region has never been ingested.
    async fn get_snapshot(&self, region_id: &str) -> Result<Arc<RegionSnapshot>>;
}

/// Result of offering a new snapshot to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// The snapshot was swapped in.
    Replaced {
        /// Capture time of the snapshot it replaced, if any.
        previous: Option<DateTime<Utc>>,
    },
    /// The payload is byte-identical to the one already held.
    Unchanged,
}

/// Counts from a directory reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    /// Regions whose snapshot was replaced.
    pub loaded: usize,
    /// Regions whose file had not changed.
    pub unchanged: usize,
    /// Files that were rejected; the previous snapshot stays in place.
    pub rejected: usize,
}

/// Statistics about the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of regions with a snapshot.
    pub regions: usize,
    /// Flights across all regions.
    pub total_flights: usize,
    /// Most recent capture time across all regions.
    pub newest_capture: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct StoredSnapshot {
    snapshot: Arc<RegionSnapshot>,
    /// BLAKE3 of the payload it was parsed from, if it came from bytes.
    fingerprint: Option<String>,
}

/// The last payload a region rejected.
#[derive(Debug)]
struct KnownRejection {
    fingerprint: String,
    message: String,
}

/// A failed ingest, and whether the same bytes had already been rejected.
#[derive(Debug)]
struct Rejected {
    error: Error,
    repeated: bool,
}

impl From<Error> for Rejected {
    fn from(error: Error) -> Self {
        Self {
            error,
            repeated: false,
        }
    }
}

/// In-memory store of the latest snapshot per region.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    regions: RwLock<HashMap<String, StoredSnapshot>>,
    rejections: Mutex<HashMap<String, KnownRejection>>,
    data_dir: Option<PathBuf>,
}

impl SnapshotStore {
    /// Create an empty store with no backing directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that loads from `data_dir`.
    #[must_use]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            regions: RwLock::default(),
            rejections: Mutex::default(),
            data_dir: Some(data_dir.into()),
        }
    }

    /// Create a store from `data_dir` and load every snapshot file in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read. Individual
    /// bad files are logged and skipped.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::with_data_dir(data_dir);
        let report = store.reload_all()?;
        info!(
            loaded = report.loaded,
            rejected = report.rejected,
            "Snapshot store opened"
        );
        Ok(store)
    }

    /// The backing directory, if any.
    #[must_use]
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Get the latest snapshot of a region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegionNotFound`] if the region is unknown.
    pub fn get(&self, region_id: &str) -> Result<Arc<RegionSnapshot>> {
        let regions = self.read_regions()?;
        regions
            .get(region_id)
            .map(|stored| Arc::clone(&stored.snapshot))
            .ok_or_else(|| Error::RegionNotFound {
                region_id: region_id.to_string(),
            })
    }

    /// Swap in a new snapshot for its region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSnapshot`] if the snapshot fails validation;
    /// the previous snapshot is kept.
    pub fn replace(&self, snapshot: RegionSnapshot) -> Result<ReplaceOutcome> {
        self.install(snapshot, None)
    }

    /// Parse a raw payload and swap it in.
    ///
    /// Payloads identical to the one the current snapshot came from are not
    /// parsed again, and neither are payloads identical to the last one the
    /// region rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSnapshot`] if the payload cannot be parsed or
    /// validated; the previous snapshot is kept.
    pub fn ingest_bytes(&self, region_id: &str, bytes: &[u8]) -> Result<ReplaceOutcome> {
        self.ingest(region_id, bytes).map_err(|rejected| rejected.error)
    }

    /// Load one snapshot file. The region id is the file stem.
    ///
    /// # Errors
    ///
    /// Returns an error if the file name is not a valid snapshot name, the
    /// file cannot be read, or its contents are malformed.
    pub fn load_file(&self, path: &Path) -> Result<ReplaceOutcome> {
        self.load(path).map_err(|rejected| rejected.error)
    }

    /// Reload every snapshot file in the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error only if the directory cannot be listed.
    pub fn reload_all(&self) -> Result<ReloadReport> {
        let mut report = ReloadReport::default();
        let Some(dir) = self.data_dir.as_deref() else {
            return Ok(report);
        };

        for path in file::list_snapshot_files(dir)? {
            match self.load(&path) {
                Ok(ReplaceOutcome::Replaced { .. }) => report.loaded += 1,
                Ok(ReplaceOutcome::Unchanged) => report.unchanged += 1,
                Err(Rejected {
                    error,
                    repeated: true,
                }) => {
                    debug!(path = %path.display(), error = %error, "Snapshot file still rejected");
                    report.rejected += 1;
                }
                Err(Rejected { error, .. }) => {
                    warn!(path = %path.display(), error = %error, "Rejected snapshot file");
                    report.rejected += 1;
                }
            }
        }

        Ok(report)
    }

    /// Known region ids, sorted.
    #[must_use]
    pub fn regions(&self) -> Vec<String> {
        let Ok(regions) = self.read_regions() else {
            return Vec::new();
        };
        let mut ids: Vec<String> = regions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Get store statistics.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let Ok(regions) = self.read_regions() else {
            return StoreStats {
                regions: 0,
                total_flights: 0,
                newest_capture: None,
            };
        };
        StoreStats {
            regions: regions.len(),
            total_flights: regions.values().map(|s| s.snapshot.len()).sum(),
            newest_capture: regions.values().map(|s| s.snapshot.captured_at).max(),
        }
    }

    fn load(&self, path: &Path) -> std::result::Result<ReplaceOutcome, Rejected> {
        let region_id = file::region_id_from_path(path).ok_or_else(|| {
            Error::malformed(path.display().to_string(), "not a snapshot file name")
        })?;
        let bytes = std::fs::read(path).map_err(Error::from)?;
        self.ingest(&region_id, &bytes)
    }

    fn ingest(
        &self,
        region_id: &str,
        bytes: &[u8],
    ) -> std::result::Result<ReplaceOutcome, Rejected> {
        let fingerprint = blake3::hash(bytes).to_hex().to_string();

        {
            let regions = self.read_regions()?;
            if let Some(stored) = regions.get(region_id) {
                if stored.fingerprint.as_deref() == Some(fingerprint.as_str()) {
                    debug!(region = %region_id, "Snapshot payload unchanged");
                    return Ok(ReplaceOutcome::Unchanged);
                }
            }
        }

        if let Some(message) = self.known_rejection(region_id, &fingerprint) {
            return Err(Rejected {
                error: Error::malformed(region_id, message),
                repeated: true,
            });
        }

        let outcome = parse_snapshot(region_id, bytes)
            .and_then(|snapshot| self.install(snapshot, Some(fingerprint.clone())));
        match outcome {
            Ok(outcome) => {
                if let Ok(mut rejections) = self.rejections.lock() {
                    rejections.remove(region_id);
                }
                Ok(outcome)
            }
            Err(error) => {
                if let Error::MalformedSnapshot { message, .. } = &error {
                    if let Ok(mut rejections) = self.rejections.lock() {
                        rejections.insert(
                            region_id.to_string(),
                            KnownRejection {
                                fingerprint,
                                message: message.clone(),
                            },
                        );
                    }
                }
                Err(error.into())
            }
        }
    }

    fn known_rejection(&self, region_id: &str, fingerprint: &str) -> Option<String> {
        let rejections = self.rejections.lock().ok()?;
        rejections
            .get(region_id)
            .filter(|known| known.fingerprint == fingerprint)
            .map(|known| known.message.clone())
    }

    fn install(
        &self,
        snapshot: RegionSnapshot,
        fingerprint: Option<String>,
    ) -> Result<ReplaceOutcome> {
        snapshot.validate()?;

        let region_id = snapshot.region_id.clone();
        let captured_at = snapshot.captured_at;
        let flights = snapshot.len();

        let mut regions = self
            .regions
            .write()
            .map_err(|_| Error::internal("snapshot store lock poisoned"))?;

        let previous = regions
            .get(&region_id)
            .map(|stored| stored.snapshot.captured_at);
        if let Some(previous) = previous {
            if captured_at < previous {
                warn!(
                    region = %region_id,
                    previous = %previous,
                    incoming = %captured_at,
                    "Replacing snapshot with an older capture"
                );
            }
        }

        regions.insert(
            region_id.clone(),
            StoredSnapshot {
                snapshot: Arc::new(snapshot),
                fingerprint,
            },
        );

        info!(region = %region_id, flights, captured_at = %captured_at, "Snapshot replaced");
        Ok(ReplaceOutcome::Replaced { previous })
    }

    fn read_regions(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, StoredSnapshot>>> {
        self.regions
            .read()
            .map_err(|_| Error::internal("snapshot store lock poisoned"))
    }
}

#[async_trait]
impl SnapshotSource for SnapshotStore {
    async fn get_snapshot(&self, region_id: &str) -> Result<Arc<RegionSnapshot>> {
        debug!(region = %region_id, "Reading snapshot");
        self.get(region_id)
    }
}
