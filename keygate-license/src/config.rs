//! Validator configuration, read from a TOML file shipped with the app.
//!
//! ```toml
//! verifying_key = "base64 Ed25519 public key"
//! data_dir = "/var/lib/app/license"   # optional
//! device_binding = true               # optional
//!
//! [policy]                            # optional, days
//! trial_days = 14
//! monthly_days = 30
//! yearly_days = 365
//! ```

use crate::codec::VerifierKey;
use crate::error::{LicenseError, LicenseResult};
use crate::key::LicensePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory name under the platform data dir.
pub const APP_DIR_NAME: &str = "keygate";

/// Settings for an installed validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseConfig {
    /// Base64 Ed25519 public key of the issuer.
    pub verifying_key: String,
    /// Where the activation snapshot and registry live.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Enforce device-bound keys.
    #[serde(default = "default_true")]
    pub device_binding: bool,
    /// License windows; must match the issuer's.
    #[serde(default)]
    pub policy: LicensePolicy,
}

fn default_true() -> bool {
    true
}

/// Platform data directory for license state, or `./keygate` when unknown.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

impl LicenseConfig {
    /// Creates a config with default location and policy.
    #[must_use]
    pub fn new(verifying_key: &VerifierKey) -> Self {
        Self {
            verifying_key: verifying_key.to_base64(),
            data_dir: default_data_dir(),
            device_binding: true,
            policy: LicensePolicy::default(),
        }
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> LicenseResult<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| LicenseError::Config(format!("invalid license config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file.
    pub fn load(path: &Path) -> LicenseResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            LicenseError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks the key and policy.
    pub fn validate(&self) -> LicenseResult<()> {
        self.verifier()?;
        self.policy.validate()
    }

    /// Decodes the verifying key.
    pub fn verifier(&self) -> LicenseResult<VerifierKey> {
        VerifierKey::from_base64(&self.verifying_key)
    }

    /// Overrides the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }
}
