//! Durable single-slot storage for the current activation.
//!
//! The store is one JSON snapshot holding the current [`ActivationRecord`]
//! and the installation's clock high-water mark. Every write goes to a temp
//! file in the same directory, is fsynced, then renamed over the snapshot,
//! so readers see either the old or the new state and never a partial one.

use crate::clock::ClockGuard;
use crate::error::{LicenseError, LicenseResult};
use crate::key::LicenseType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the snapshot inside the data directory.
pub const ACTIVATION_FILE: &str = "activation.json";

const SNAPSHOT_VERSION: u32 = 1;

/// The persisted activation of this device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRecord {
    /// Canonical key text.
    pub key: String,
    /// When the key was activated on this device.
    pub activated_at: DateTime<Utc>,
    /// Latest wall-clock time observed while this record was current.
    pub last_seen: DateTime<Utc>,
    /// License type from the key.
    pub license_type: LicenseType,
    /// Expiry from the key.
    pub expires_at: DateTime<Utc>,
    /// False once a check has observed the license as expired.
    pub is_active: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    record: Option<ActivationRecord>,
    high_water_mark: Option<DateTime<Utc>>,
}

/// File-backed activation store.
#[derive(Debug, Clone)]
pub struct ActivationStore {
    path: PathBuf,
    #[cfg(test)]
    pub(crate) fail_writes: bool,
}

impl ActivationStore {
    /// Uses the snapshot file at `path`. Nothing is read or created yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            #[cfg(test)]
            fail_writes: false,
        }
    }

    /// Uses [`ACTIVATION_FILE`] inside `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(ACTIVATION_FILE))
    }

    /// Returns the snapshot path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the current record.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::StorageCorrupt`] if the snapshot exists but
    /// cannot be parsed, and [`LicenseError::Storage`] if it cannot be read.
    pub fn load(&self) -> LicenseResult<Option<ActivationRecord>> {
        Ok(self.read_snapshot()?.record)
    }

    /// Returns the latest time ever observed on this installation.
    ///
    /// Survives [`reset`](Self::reset).
    pub fn high_water_mark(&self) -> LicenseResult<Option<DateTime<Utc>>> {
        let snapshot = self.read_snapshot()?;
        let from_record = snapshot.record.map(|r| r.last_seen);
        Ok(match (snapshot.high_water_mark, from_record) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        })
    }

    /// Replaces the current record atomically.
    pub fn save(&self, record: &ActivationRecord) -> LicenseResult<()> {
        let previous = self.preserved_high_water();
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            record: Some(record.clone()),
            high_water_mark: Some(ClockGuard::high_water(previous, record.last_seen)),
        };
        self.write_snapshot(&snapshot)?;
        debug!(path = %self.path.display(), "saved activation record");
        Ok(())
    }

    /// Removes the current record, keeping the high-water mark.
    pub fn reset(&self) -> LicenseResult<()> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            record: None,
            high_water_mark: self.preserved_high_water(),
        };
        self.write_snapshot(&snapshot)
    }

    fn preserved_high_water(&self) -> Option<DateTime<Utc>> {
        match self.high_water_mark() {
            Ok(mark) => mark,
            Err(e) => {
                warn!(error = %e, "discarding unreadable activation snapshot");
                None
            }
        }
    }

    fn read_snapshot(&self) -> LicenseResult<Snapshot> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Snapshot::default()),
            Err(e) => {
                return Err(LicenseError::Storage(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )));
            }
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes)
            .map_err(|e| LicenseError::StorageCorrupt(format!("{}: {e}", self.path.display())))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(LicenseError::StorageCorrupt(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }

    fn write_snapshot(&self, snapshot: &Snapshot) -> LicenseResult<()> {
        #[cfg(test)]
        if self.fail_writes {
            return Err(LicenseError::Storage("writes disabled".to_string()));
        }

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .map_err(|e| LicenseError::Storage(format!("cannot create {}: {e}", dir.display())))?;

        let bytes = serde_json::to_vec_pretty(snapshot)?;

        let mut temp = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| LicenseError::Storage(format!("cannot create temp file: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|e| LicenseError::Storage(format!("cannot set permissions: {e}")))?;
        }

        temp.as_file_mut()
            .write_all(&bytes)
            .map_err(|e| LicenseError::Storage(format!("cannot write temp file: {e}")))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| LicenseError::Storage(format!("cannot sync temp file: {e}")))?;
        temp.persist(&self.path).map_err(|e| {
            LicenseError::Storage(format!("cannot persist {}: {e}", self.path.display()))
        })?;
        Ok(())
    }
}
