//! Append-only log of every key generated or activated on this installation.
//!
//! Backed by SQLite. Triggers abort any `UPDATE` or `DELETE`, so an entry can
//! never change once appended, even through a raw connection.
//!
//! The same database keeps a single-row clock mark: the latest time any
//! validator check observed. It lives apart from the activation snapshot so
//! losing one file does not lose the installation's high-water mark.

use crate::error::{LicenseError, LicenseResult};
use crate::key::LicenseType;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// File name of the registry database inside the data directory.
pub const REGISTRY_FILE: &str = "registry.db";

/// What happened to the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryOutcome {
    /// Issued by the generator.
    Generated,
    /// Activated as the current license.
    Activated,
    /// The current key was entered again.
    Reactivated,
    /// Key failed to decode or verify.
    Rejected,
    /// Key is bound to another device.
    DeviceMismatch,
    /// The current activation was removed by an administrator.
    Reset,
}

impl RegistryOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Activated => "activated",
            Self::Reactivated => "reactivated",
            Self::Rejected => "rejected",
            Self::DeviceMismatch => "device_mismatch",
            Self::Reset => "reset",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "generated" => Some(Self::Generated),
            "activated" => Some(Self::Activated),
            "reactivated" => Some(Self::Reactivated),
            "rejected" => Some(Self::Rejected),
            "device_mismatch" => Some(Self::DeviceMismatch),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

/// One registry line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    /// Time-ordered entry id.
    pub id: Uuid,
    /// Key text as entered (canonical when it decoded).
    pub key: String,
    /// What happened.
    pub outcome: RegistryOutcome,
    /// License type, when the key decoded.
    pub license_type: Option<LicenseType>,
    /// When it happened: generation time for `Generated`, activation time otherwise.
    pub recorded_at: DateTime<Utc>,
    /// Free-form detail, e.g. the rejection reason.
    pub detail: Option<String>,
}

impl RegistryEntry {
    /// Creates an entry with a fresh id.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        outcome: RegistryOutcome,
        license_type: Option<LicenseType>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            key: key.into(),
            outcome,
            license_type,
            recorded_at,
            detail: None,
        }
    }

    /// Attaches a detail message.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// SQLite-backed registry.
pub struct Registry {
    conn: Mutex<Connection>,
}

impl Registry {
    /// Opens (or creates) the registry at `path`.
    pub fn open(path: &Path) -> LicenseResult<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                LicenseError::Registry(format!("cannot create {}: {e}", dir.display()))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| LicenseError::Registry(format!("failed to open registry: {e}")))?;
        Self::init(conn)
    }

    /// Opens [`REGISTRY_FILE`] inside `dir`.
    pub fn in_dir(dir: &Path) -> LicenseResult<Self> {
        Self::open(&dir.join(REGISTRY_FILE))
    }

    /// Opens an in-memory registry (for testing).
    pub fn open_in_memory() -> LicenseResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| LicenseError::Registry(format!("failed to open in-memory registry: {e}")))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> LicenseResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS registry (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                license_key TEXT NOT NULL,
                outcome TEXT NOT NULL,
                license_type TEXT,
                recorded_at INTEGER NOT NULL,
                detail TEXT
            );

            CREATE TRIGGER IF NOT EXISTS registry_no_update
            BEFORE UPDATE ON registry
            BEGIN
                SELECT RAISE(ABORT, 'registry is append-only');
            END;

            CREATE TRIGGER IF NOT EXISTS registry_no_delete
            BEFORE DELETE ON registry
            BEGIN
                SELECT RAISE(ABORT, 'registry is append-only');
            END;

            CREATE TABLE IF NOT EXISTS clock_mark (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                observed_at INTEGER NOT NULL
            );

            CREATE TRIGGER IF NOT EXISTS clock_mark_no_rewind
            BEFORE UPDATE ON clock_mark
            WHEN NEW.observed_at < OLD.observed_at
            BEGIN
                SELECT RAISE(ABORT, 'clock mark cannot move backwards');
            END;

            CREATE TRIGGER IF NOT EXISTS clock_mark_no_delete
            BEFORE DELETE ON clock_mark
            BEGIN
                SELECT RAISE(ABORT, 'clock mark cannot be removed');
            END;
            ",
        )
        .map_err(|e| LicenseError::Registry(format!("failed to initialize registry: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends an entry.
    pub fn append(&self, entry: &RegistryEntry) -> LicenseResult<()> {
        self.conn()
            .execute(
                "INSERT INTO registry (id, license_key, outcome, license_type, recorded_at, detail)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.id.to_string(),
                    entry.key,
                    entry.outcome.as_str(),
                    entry.license_type.map(LicenseType::as_str),
                    entry.recorded_at.timestamp_millis(),
                    entry.detail,
                ],
            )
            .map_err(|e| LicenseError::Registry(format!("failed to append entry: {e}")))?;
        Ok(())
    }

    /// Returns every entry in insertion order.
    pub fn list(&self) -> LicenseResult<Vec<RegistryEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, license_key, outcome, license_type, recorded_at, detail
             FROM registry ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, key, outcome, license_type, recorded_at, detail) = row?;
            let id = Uuid::parse_str(&id)
                .map_err(|e| LicenseError::Registry(format!("invalid entry id: {e}")))?;
            let outcome = RegistryOutcome::parse(&outcome)
                .ok_or_else(|| LicenseError::Registry(format!("unknown outcome {outcome}")))?;
            let license_type = license_type.and_then(|t| t.parse().ok());
            let recorded_at = DateTime::from_timestamp_millis(recorded_at)
                .ok_or_else(|| LicenseError::Registry("invalid entry timestamp".to_string()))?;
            entries.push(RegistryEntry {
                id,
                key,
                outcome,
                license_type,
                recorded_at,
                detail,
            });
        }
        Ok(entries)
    }

    /// Raises the clock mark to `at`. Earlier times leave it unchanged.
    pub fn observe(&self, at: DateTime<Utc>) -> LicenseResult<()> {
        self.conn()
            .execute(
                "INSERT INTO clock_mark (id, observed_at) VALUES (1, ?1)
                 ON CONFLICT(id) DO UPDATE SET observed_at = excluded.observed_at
                 WHERE excluded.observed_at > clock_mark.observed_at",
                params![at.timestamp_millis()],
            )
            .map_err(|e| LicenseError::Registry(format!("failed to record clock mark: {e}")))?;
        Ok(())
    }

    /// Returns the latest time this registry has seen, from the clock mark
    /// or from any entry.
    pub fn high_water_mark(&self) -> LicenseResult<Option<DateTime<Utc>>> {
        let millis: Option<i64> = self.conn().query_row(
            "SELECT MAX(t) FROM (
                 SELECT MAX(recorded_at) AS t FROM registry
                 UNION ALL
                 SELECT observed_at AS t FROM clock_mark
             )",
            [],
            |row| row.get(0),
        )?;
        millis
            .map(|ms| {
                DateTime::from_timestamp_millis(ms)
                    .ok_or_else(|| LicenseError::Registry("invalid clock mark".to_string()))
            })
            .transpose()
    }

    /// Returns the number of entries.
    pub fn count(&self) -> LicenseResult<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM registry", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    #[cfg(test)]
    pub(crate) fn raw_execute(&self, sql: &str) -> rusqlite::Result<usize> {
        self.conn().execute(sql, [])
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").finish_non_exhaustive()
    }
}
