//! Issuer configuration (TOML).
//!
//! ```toml
//! secret_key_path = "/secure/keygate-issuer.key"
//! registry_path = "/secure/issued.db"
//!
//! [policy]
//! trial_days = 14
//! ```

use crate::error::{IssuerError, IssuerResult};
use keygate_license::{default_data_dir, LicensePolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for the admin-side issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    /// File holding the base64 signing secret.
    pub secret_key_path: PathBuf,
    /// Registry of issued keys.
    pub registry_path: PathBuf,
    /// License windows; validators must be configured with the same values.
    pub policy: LicensePolicy,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        let dir = default_data_dir().join("issuer");
        Self {
            secret_key_path: dir.join("issuer.key"),
            registry_path: dir.join("issued.db"),
            policy: LicensePolicy::default(),
        }
    }
}

impl IssuerConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> IssuerResult<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| IssuerError::Config(format!("invalid issuer config: {e}")))?;
        config.policy.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file.
    pub fn load(path: &Path) -> IssuerResult<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| IssuerError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }
}
