//! License payload model and its fixed binary layout.
//!
//! Payload layout (version 1, big-endian):
//!
//! | offset | size | field                         |
//! |--------|------|-------------------------------|
//! | 0      | 1    | layout version (`1`)          |
//! | 1      | 1    | license type tag              |
//! | 2      | 1    | flags (bit 0: bound)          |
//! | 3      | 8    | issued-at, seconds since epoch |
//! | 11     | 8    | expires-at, seconds since epoch |
//! | 19     | 16   | bound id (present iff bit 0)  |

use crate::error::{LicenseError, LicenseResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Seconds in one day.
pub const SECS_PER_DAY: i64 = 24 * 60 * 60;

/// Current payload layout version.
pub const PAYLOAD_VERSION: u8 = 1;

/// Size of an unbound payload in bytes.
pub const PAYLOAD_LEN: usize = 19;

/// Size of a bound payload in bytes.
pub const BOUND_PAYLOAD_LEN: usize = PAYLOAD_LEN + BOUND_ID_LEN;

/// Size of a bound identifier in bytes.
pub const BOUND_ID_LEN: usize = 16;

const FLAG_BOUND: u8 = 0b0000_0001;

/// The license type encoded in a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseType {
    /// Short evaluation window.
    Trial,
    /// Monthly subscription.
    Monthly,
    /// Yearly subscription.
    Yearly,
}

impl LicenseType {
    /// Returns the wire tag used in the binary payload.
    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            Self::Trial => 0,
            Self::Monthly => 1,
            Self::Yearly => 2,
        }
    }

    /// Parses a wire tag.
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Trial),
            1 => Some(Self::Monthly),
            2 => Some(Self::Yearly),
            _ => None,
        }
    }

    /// Lowercase name, matching the serde representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LicenseType {
    type Err = LicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trial" => Ok(Self::Trial),
            "monthly" => Ok(Self::Monthly),
            "yearly" | "annual" => Ok(Self::Yearly),
            other => Err(LicenseError::Config(format!("unknown license type: {other}"))),
        }
    }
}

/// Duration of each license type, in days.
///
/// Shared between the issuer and every validator: a key whose validity
/// window disagrees with the policy is rejected at activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicensePolicy {
    /// Trial window.
    pub trial_days: u32,
    /// Monthly subscription window.
    pub monthly_days: u32,
    /// Yearly subscription window.
    pub yearly_days: u32,
}

impl Default for LicensePolicy {
    fn default() -> Self {
        Self {
            trial_days: 14,
            monthly_days: 30,
            yearly_days: 365,
        }
    }
}

impl LicensePolicy {
    /// Returns the window for `license_type` in days.
    #[must_use]
    pub fn duration_days(&self, license_type: LicenseType) -> u32 {
        match license_type {
            LicenseType::Trial => self.trial_days,
            LicenseType::Monthly => self.monthly_days,
            LicenseType::Yearly => self.yearly_days,
        }
    }

    /// Returns the window for `license_type` in seconds.
    #[must_use]
    pub fn duration_secs(&self, license_type: LicenseType) -> i64 {
        i64::from(self.duration_days(license_type)) * SECS_PER_DAY
    }

    /// Rejects zero-length windows.
    pub fn validate(&self) -> LicenseResult<()> {
        for license_type in [LicenseType::Trial, LicenseType::Monthly, LicenseType::Yearly] {
            if self.duration_days(license_type) == 0 {
                return Err(LicenseError::Config(format!(
                    "{license_type} duration must be at least one day"
                )));
            }
        }
        Ok(())
    }
}

/// Opaque device or user identifier a key can be restricted to.
///
/// Stored as the first 16 bytes of the SHA-256 of the identifier string, so
/// the key never carries the identifier itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundId([u8; BOUND_ID_LEN]);

impl BoundId {
    /// Derives a bound id from an identifier string.
    #[must_use]
    pub fn derive(identifier: &str) -> Self {
        let hash = Sha256::digest(identifier.trim().as_bytes());
        let mut bytes = [0u8; BOUND_ID_LEN];
        bytes.copy_from_slice(&hash[..BOUND_ID_LEN]);
        Self(bytes)
    }

    /// Wraps raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; BOUND_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; BOUND_ID_LEN] {
        &self.0
    }
}

impl fmt::Debug for BoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoundId(")?;
        for b in &self.0[..4] {
            write!(f, "{b:02x}")?;
        }
        write!(f, "..)")
    }
}

/// The data a license key encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensePayload {
    /// License type.
    pub license_type: LicenseType,
    /// Issued-at timestamp (seconds since epoch).
    pub issued_at: i64,
    /// Expiration timestamp (seconds since epoch).
    pub expires_at: i64,
    /// Device or user the key is restricted to.
    pub bound_id: Option<BoundId>,
}

impl LicensePayload {
    /// Builds a payload issued at `issued_at` whose window follows `policy`.
    #[must_use]
    pub fn new(
        license_type: LicenseType,
        issued_at: i64,
        policy: &LicensePolicy,
        bound_id: Option<BoundId>,
    ) -> Self {
        Self {
            license_type,
            issued_at,
            expires_at: issued_at + policy.duration_secs(license_type),
            bound_id,
        }
    }

    /// Returns the expiry as a UTC datetime.
    #[must_use]
    pub fn expires_at_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.expires_at, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Returns the issue time as a UTC datetime.
    #[must_use]
    pub fn issued_at_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.issued_at, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Returns true if the validity window matches `policy` for this type.
    #[must_use]
    pub fn matches_policy(&self, policy: &LicensePolicy) -> bool {
        self.expires_at - self.issued_at == policy.duration_secs(self.license_type)
    }

    /// Serializes the payload into its fixed binary layout.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BOUND_PAYLOAD_LEN);
        out.push(PAYLOAD_VERSION);
        out.push(self.license_type.tag());
        out.push(if self.bound_id.is_some() { FLAG_BOUND } else { 0 });
        out.extend_from_slice(&self.issued_at.to_be_bytes());
        out.extend_from_slice(&self.expires_at.to_be_bytes());
        if let Some(bound) = &self.bound_id {
            out.extend_from_slice(bound.as_bytes());
        }
        out
    }

    /// Parses a payload from its binary layout.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidKey`] for unknown versions, type tags or
    /// flags, a length that disagrees with the flags, or `expires_at <= issued_at`.
    pub fn from_bytes(bytes: &[u8]) -> LicenseResult<Self> {
        if bytes.len() < PAYLOAD_LEN {
            return Err(LicenseError::InvalidKey("payload too short".to_string()));
        }
        if bytes[0] != PAYLOAD_VERSION {
            return Err(LicenseError::InvalidKey(format!(
                "unsupported payload version {}",
                bytes[0]
            )));
        }
        let license_type = LicenseType::from_tag(bytes[1])
            .ok_or_else(|| LicenseError::InvalidKey(format!("unknown license type {}", bytes[1])))?;

        let flags = bytes[2];
        if flags & !FLAG_BOUND != 0 {
            return Err(LicenseError::InvalidKey(format!("unknown flags {flags:#04x}")));
        }
        let expected_len = if flags & FLAG_BOUND != 0 {
            BOUND_PAYLOAD_LEN
        } else {
            PAYLOAD_LEN
        };
        if bytes.len() != expected_len {
            return Err(LicenseError::InvalidKey(format!(
                "payload length {} does not match flags",
                bytes.len()
            )));
        }

        let issued_at = read_i64(&bytes[3..11]);
        let expires_at = read_i64(&bytes[11..19]);
        if expires_at <= issued_at {
            return Err(LicenseError::InvalidKey(
                "expiry is not after issue time".to_string(),
            ));
        }

        let bound_id = if flags & FLAG_BOUND != 0 {
            let mut id = [0u8; BOUND_ID_LEN];
            id.copy_from_slice(&bytes[PAYLOAD_LEN..BOUND_PAYLOAD_LEN]);
            Some(BoundId::from_bytes(id))
        } else {
            None
        };

        Ok(Self {
            license_type,
            issued_at,
            expires_at,
            bound_id,
        })
    }
}

fn read_i64(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    i64::from_be_bytes(buf)
}

/// A decoded and verified license key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseKey {
    /// Canonical key text (uppercase, grouped).
    text: String,
    /// Verified payload.
    payload: LicensePayload,
}

impl LicenseKey {
    pub(crate) fn new(text: String, payload: LicensePayload) -> Self {
        Self { text, payload }
    }

    /// Returns the canonical key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns the verified payload.
    #[must_use]
    pub fn payload(&self) -> &LicensePayload {
        &self.payload
    }

    /// Returns the license type.
    #[must_use]
    pub fn license_type(&self) -> LicenseType {
        self.payload.license_type
    }

    /// Returns the first block of the key, safe for logs.
    #[must_use]
    pub fn short(&self) -> &str {
        self.text.split('-').next().unwrap_or_default()
    }
}

impl fmt::Display for LicenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
