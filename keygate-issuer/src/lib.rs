//! Admin-side license key issuer for Keygate.
//!
//! Holds the Ed25519 signing secret and mints keys. This crate is never
//! linked into the application shipped to end users; they only carry the
//! public verifying key from [`Generator::verifier`].

mod config;
mod error;
mod secret;

pub use config::IssuerConfig;
pub use error::{IssuerError, IssuerResult};
pub use secret::{read_secret, write_secret};

use keygate_license::{
    encode, BoundId, Clock, IssuerKey, LicenseKey, LicensePayload, LicensePolicy, LicenseType,
    Registry, RegistryEntry, RegistryOutcome, SystemClock, VerifierKey,
};
use tracing::{info, warn};

/// Mints signed license keys and records them in the issuer's registry.
pub struct Generator<C: Clock = SystemClock> {
    issuer: IssuerKey,
    policy: LicensePolicy,
    registry: Registry,
    clock: C,
}

impl Generator<SystemClock> {
    /// Opens the generator described by `config`.
    pub fn open(config: &IssuerConfig) -> IssuerResult<Self> {
        config.policy.validate()?;
        let issuer = read_secret(&config.secret_key_path)?;
        let registry = Registry::open(&config.registry_path)?;
        Ok(Self::new(issuer, registry, SystemClock).with_policy(config.policy))
    }
}

impl<C: Clock> Generator<C> {
    /// Creates a generator with the default policy.
    pub fn new(issuer: IssuerKey, registry: Registry, clock: C) -> Self {
        Self {
            issuer,
            policy: LicensePolicy::default(),
            registry,
            clock,
        }
    }

    /// Sets the license windows. Validators must use the same policy.
    #[must_use]
    pub fn with_policy(mut self, policy: LicensePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the verifying key to embed in installed copies.
    #[must_use]
    pub fn verifier(&self) -> VerifierKey {
        self.issuer.verifier()
    }

    /// Issues a key valid from now for the policy window of `license_type`.
    ///
    /// `bound_id` restricts the key to the device reporting that identifier.
    pub fn generate(
        &self,
        license_type: LicenseType,
        bound_id: Option<&str>,
    ) -> IssuerResult<LicenseKey> {
        let now = self.clock.now();
        let payload = LicensePayload::new(
            license_type,
            now.timestamp(),
            &self.policy,
            bound_id.map(BoundId::derive),
        );
        let key = encode(&payload, &self.issuer);

        info!(
            key = key.short(),
            %license_type,
            bound = bound_id.is_some(),
            "license key generated"
        );
        let mut entry = RegistryEntry::new(
            key.as_str(),
            RegistryOutcome::Generated,
            Some(license_type),
            now,
        );
        if let Some(id) = bound_id {
            entry = entry.with_detail(format!("bound to {id}"));
        }
        if let Err(e) = self.registry.append(&entry) {
            warn!(error = %e, "failed to record generated key");
        }
        Ok(key)
    }

    /// Returns every key this issuer has generated, oldest first.
    pub fn list(&self) -> IssuerResult<Vec<RegistryEntry>> {
        Ok(self.registry.list()?)
    }
}
