//! Activation and validation state machine.
//!
//! ```text
//! Unactivated --activate--> Active --time--> Expired
//!                             |  ^
//!                  clock back |  | clock catches up
//!                             v  |
//!                         ClockTampered
//! ```
//!
//! `Expired` and `ClockTampered` leave through activation of another key.
//! Clock tampering is never reported as such: callers see an expired license.

use crate::clock::{Clock, ClockGuard, SystemClock};
use crate::codec::{self, VerifierKey};
use crate::config::LicenseConfig;
use crate::device::DeviceFingerprint;
use crate::error::{LicenseError, LicenseResult};
use crate::key::{LicenseKey, LicensePolicy};
use crate::registry::{Registry, RegistryEntry, RegistryOutcome};
use crate::state::LicenseState;
use crate::store::{ActivationRecord, ActivationStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Longest rejected input kept in the registry.
const MAX_REJECTED_KEY_LEN: usize = 256;

/// Result of a successful activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationOutcome {
    /// The key is now the current license.
    Activated,
    /// The key already was the current license; nothing changed.
    Reactivated,
}

/// Owns the activation store and decides the license state.
///
/// All reads and writes of the store happen under one lock, so concurrent
/// activations are serialized and the last one wins.
pub struct Validator<C: Clock = SystemClock> {
    store: Mutex<ActivationStore>,
    registry: Registry,
    verifier: VerifierKey,
    policy: LicensePolicy,
    device: Option<DeviceFingerprint>,
    clock: C,
}

impl Validator<SystemClock> {
    /// Opens the validator described by `config`, binding to this device
    /// when `device_binding` is enabled.
    pub fn open(config: &LicenseConfig) -> LicenseResult<Self> {
        config.validate()?;
        let validator = Self::new(
            ActivationStore::in_dir(&config.data_dir),
            Registry::in_dir(&config.data_dir)?,
            config.verifier()?,
            SystemClock,
        )
        .with_policy(config.policy);

        Ok(if config.device_binding {
            validator.with_device(DeviceFingerprint::generate())
        } else {
            validator
        })
    }
}

impl<C: Clock> Validator<C> {
    /// Creates a validator with the default policy and no device binding.
    pub fn new(store: ActivationStore, registry: Registry, verifier: VerifierKey, clock: C) -> Self {
        Self {
            store: Mutex::new(store),
            registry,
            verifier,
            policy: LicensePolicy::default(),
            device: None,
            clock,
        }
    }

    /// Sets the license windows keys must agree with.
    #[must_use]
    pub fn with_policy(mut self, policy: LicensePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enforces device-bound keys against `device`.
    #[must_use]
    pub fn with_device(mut self, device: DeviceFingerprint) -> Self {
        self.device = Some(device);
        self
    }

    /// Returns the device keys are bound against, if binding is enabled.
    #[must_use]
    pub fn device(&self) -> Option<&DeviceFingerprint> {
        self.device.as_ref()
    }

    fn lock_store(&self) -> MutexGuard<'_, ActivationStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Activates `key` as this device's license.
    ///
    /// Entering the current key again is a no-op reported as
    /// [`ActivationOutcome::Reactivated`]. Any other valid key replaces the
    /// current record.
    ///
    /// # Errors
    ///
    /// [`LicenseError::InvalidKey`] or [`LicenseError::DeviceMismatch`] leave
    /// the current record untouched. Storage errors mean nothing was written.
    pub fn activate(&self, key: &str) -> LicenseResult<ActivationOutcome> {
        let store = self.lock_store();
        let now = self.clock.now();

        let key = match self.admit(key) {
            Ok(key) => key,
            Err(err) => {
                let outcome = match &err {
                    LicenseError::DeviceMismatch => RegistryOutcome::DeviceMismatch,
                    _ => RegistryOutcome::Rejected,
                };
                warn!(error = %err, "license key refused");
                let text: String = codec::canonicalize(key)
                    .unwrap_or_else(|_| key.trim().to_string())
                    .chars()
                    .take(MAX_REJECTED_KEY_LEN)
                    .collect();
                self.record(RegistryEntry::new(text, outcome, None, now).with_detail(err.to_string()));
                return Err(err);
            }
        };

        match store.load() {
            Ok(Some(current)) if current.key == key.as_str() => {
                info!(key = key.short(), "license key re-entered");
                self.record(RegistryEntry::new(
                    key.as_str(),
                    RegistryOutcome::Reactivated,
                    Some(key.license_type()),
                    now,
                ));
                return Ok(ActivationOutcome::Reactivated);
            }
            Ok(_) => {}
            Err(LicenseError::StorageCorrupt(detail)) => {
                warn!(%detail, "replacing unreadable activation record");
            }
            Err(e) => return Err(e),
        }

        let high_water = store
            .high_water_mark()
            .unwrap_or_else(|e| {
                warn!(error = %e, "high-water mark unavailable");
                None
            })
            .max(self.registry_mark());
        if let Some(mark) = high_water.filter(|mark| now < *mark) {
            warn!(%mark, %now, "activating while the clock reads earlier than last seen");
        }

        let payload = key.payload();
        let record = ActivationRecord {
            key: key.as_str().to_string(),
            activated_at: now,
            last_seen: ClockGuard::high_water(high_water, now),
            license_type: payload.license_type,
            expires_at: payload.expires_at_utc(),
            is_active: true,
        };
        store.save(&record)?;

        info!(
            key = key.short(),
            license_type = %payload.license_type,
            expires_at = %record.expires_at,
            "license activated"
        );
        self.record(RegistryEntry::new(
            key.as_str(),
            RegistryOutcome::Activated,
            Some(payload.license_type),
            now,
        ));
        Ok(ActivationOutcome::Activated)
    }

    /// Derives the current license state.
    ///
    /// Never fails: any problem with the stored record reads as unlicensed,
    /// and a clock set back before the last check reads as expired. On a
    /// normal check the new high-water mark is persisted before a licensed
    /// state is returned.
    pub fn get_state(&self) -> LicenseState {
        let store = self.lock_store();
        let now = self.clock.now();

        let mut record = match store.load() {
            Ok(Some(record)) => record,
            Ok(None) => return LicenseState::unlicensed(),
            Err(e) => {
                warn!(error = %e, "activation record unreadable, treating as unlicensed");
                return LicenseState::unlicensed();
            }
        };

        if let Err(e) = self.verify_record(&record) {
            warn!(error = %e, "activation record rejected, treating as unlicensed");
            return LicenseState::unlicensed();
        }

        let mark = ClockGuard::high_water(self.registry_mark(), record.last_seen);
        let now = match ClockGuard::ensure(mark, now) {
            Ok(now) => now,
            Err(e) => {
                warn!(error = %e, %mark, %now, "clock is behind last observed time");
                return LicenseState::rolled_back(&record);
            }
        };

        let state = LicenseState::evaluate(&record, now);
        record.last_seen = now;
        record.is_active = !state.is_expired;
        if let Err(e) = store.save(&record) {
            warn!(error = %e, "cannot persist last-seen time, treating as unlicensed");
            return LicenseState::unlicensed();
        }
        if let Err(e) = self.registry.observe(now) {
            warn!(error = %e, "cannot record clock mark in registry");
        }
        debug!(days_remaining = state.days_remaining, "license checked");
        state
    }

    /// Alias of [`get_state`](Self::get_state) for the UI boundary.
    pub fn get_activated(&self) -> LicenseState {
        self.get_state()
    }

    /// Removes the current activation. The clock high-water mark is kept.
    pub fn reset(&self) -> LicenseResult<()> {
        let store = self.lock_store();
        let now = self.clock.now();
        let previous = store.load().ok().flatten();
        store.reset()?;

        let (key, license_type) = previous
            .map(|r| (r.key, Some(r.license_type)))
            .unwrap_or_default();
        info!("license activation reset");
        self.record(RegistryEntry::new(key, RegistryOutcome::Reset, license_type, now));
        Ok(())
    }

    /// Returns the registry in insertion order.
    pub fn get_all(&self) -> LicenseResult<Vec<RegistryEntry>> {
        self.registry.list()
    }

    /// Decodes `text` and applies policy and device checks.
    fn admit(&self, text: &str) -> LicenseResult<LicenseKey> {
        let key = codec::decode(text, &self.verifier)?;
        let payload = key.payload();
        if !payload.matches_policy(&self.policy) {
            return Err(LicenseError::InvalidKey(format!(
                "validity window does not match {} policy",
                payload.license_type
            )));
        }
        self.check_device(&key)?;
        Ok(key)
    }

    fn check_device(&self, key: &LicenseKey) -> LicenseResult<()> {
        match (&self.device, key.payload().bound_id) {
            (Some(device), Some(bound)) if device.bound_id() != bound => {
                Err(LicenseError::DeviceMismatch)
            }
            _ => Ok(()),
        }
    }

    /// Confirms the stored record still matches its signed key.
    fn verify_record(&self, record: &ActivationRecord) -> LicenseResult<()> {
        let key = self.admit(&record.key)?;
        let payload = key.payload();
        if key.as_str() != record.key
            || payload.license_type != record.license_type
            || payload.expires_at != record.expires_at.timestamp()
        {
            return Err(LicenseError::StorageCorrupt(
                "record fields disagree with the signed key".to_string(),
            ));
        }
        Ok(())
    }

    /// Latest time the registry has seen, or `None` if it cannot be read.
    fn registry_mark(&self) -> Option<DateTime<Utc>> {
        self.registry.high_water_mark().unwrap_or_else(|e| {
            warn!(error = %e, "registry clock mark unavailable");
            None
        })
    }

    fn record(&self, entry: RegistryEntry) {
        if let Err(e) = self.registry.append(&entry) {
            warn!(error = %e, outcome = ?entry.outcome, "failed to append registry entry");
        }
    }
}

impl<C: Clock> std::fmt::Debug for Validator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("policy", &self.policy)
            .field("device_binding", &self.device.is_some())
            .finish_non_exhaustive()
    }
}
