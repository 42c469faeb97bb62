//! User-facing license state, derived on every query.

use crate::key::{LicenseType, SECS_PER_DAY};
use crate::store::ActivationRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// License state consumed by the route guard. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseState {
    /// The application may be used.
    pub is_licensed: bool,
    /// Type of the current license, if any.
    pub license_type: Option<LicenseType>,
    /// Expiry of the current license, if any.
    pub expires_at: Option<DateTime<Utc>>,
    /// Whole days left, rounded up; zero once expired.
    pub days_remaining: i64,
    /// The current license is past its expiry (or the clock was set back).
    pub is_expired: bool,
    /// The current license is a trial.
    pub is_trial: bool,
}

impl LicenseState {
    /// State reported when no usable activation exists.
    #[must_use]
    pub fn unlicensed() -> Self {
        Self {
            is_licensed: false,
            license_type: None,
            expires_at: None,
            days_remaining: 0,
            is_expired: false,
            is_trial: false,
        }
    }

    /// Derives the state of `record` at `now`.
    #[must_use]
    pub fn evaluate(record: &ActivationRecord, now: DateTime<Utc>) -> Self {
        let remaining = (record.expires_at - now).num_seconds();
        let is_expired = now >= record.expires_at;
        Self {
            is_licensed: !is_expired,
            license_type: Some(record.license_type),
            expires_at: Some(record.expires_at),
            days_remaining: if is_expired {
                0
            } else {
                (remaining.max(0) + SECS_PER_DAY - 1) / SECS_PER_DAY
            },
            is_expired,
            is_trial: record.license_type == LicenseType::Trial,
        }
    }

    /// State reported while the clock reads earlier than the high-water mark.
    ///
    /// Indistinguishable from an ordinary expiry.
    #[must_use]
    pub fn rolled_back(record: &ActivationRecord) -> Self {
        Self {
            is_licensed: false,
            license_type: Some(record.license_type),
            expires_at: Some(record.expires_at),
            days_remaining: 0,
            is_expired: true,
            is_trial: record.license_type == LicenseType::Trial,
        }
    }
}

impl Default for LicenseState {
    fn default() -> Self {
        Self::unlicensed()
    }
}
