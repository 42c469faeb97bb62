//! Offline licensing for Keygate.
//!
//! This crate handles:
//! - License key decoding and Ed25519 signature verification
//! - Activation of a key as the device's single current license
//! - Expiry evaluation and clock rollback detection
//! - Durable activation state and an append-only key registry
//! - Device binding via a hardware fingerprint
//!
//! # Design Principles
//!
//! - **Offline-only**: no network calls; a key is verified against an
//!   embedded public key
//! - **Asymmetric**: installed copies can verify keys but not mint them;
//!   signing lives behind the `issuer` feature
//! - **Never fatal**: every failure reads as "unlicensed" or "expired"
//!   rather than crashing the host application
//!
//! # License Key Format
//!
//! Crockford base32 of `payload || ed25519(payload)`, in dash-separated
//! blocks of five. See [`codec`] and [`key`] for the exact layout.

mod api;
pub mod clock;
pub mod codec;
mod config;
mod device;
mod error;
pub mod key;
mod registry;
mod state;
mod store;
mod validator;

pub use api::ActivationResponse;
pub use clock::{Clock, ClockGuard, ClockVerdict, ManualClock, SystemClock};
pub use codec::{decode, VerifierKey};
#[cfg(feature = "issuer")]
pub use codec::{encode, IssuerKey};
pub use config::{default_data_dir, LicenseConfig};
pub use device::{DeviceFingerprint, DeviceInfo};
pub use error::{ErrorKind, LicenseError, LicenseResult};
pub use key::{BoundId, LicenseKey, LicensePayload, LicensePolicy, LicenseType};
pub use registry::{Registry, RegistryEntry, RegistryOutcome, REGISTRY_FILE};
pub use state::LicenseState;
pub use store::{ActivationRecord, ActivationStore, ACTIVATION_FILE};
pub use validator::{ActivationOutcome, Validator};
