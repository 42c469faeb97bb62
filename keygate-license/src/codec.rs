//! License key text encoding and Ed25519 signature verification.
//!
//! A key is `payload || signature`, where the signature is Ed25519 over the
//! payload bytes (see [`crate::key`] for the payload layout). The bytes are
//! written as Crockford base32 in dash-separated blocks of five so a key can
//! be read aloud or typed by hand:
//!
//! ```text
//! 04000-0000C-...-RXF3Q
//! ```
//!
//! Decoding is case-insensitive, ignores dashes, and treats `I`/`L` as `1`
//! and `O` as `0`. Trailing pad bits must be zero so no character of the
//! canonical text is free to change.
//!
//! Installed copies only hold a [`VerifierKey`], the public half derived
//! one-way from the issuer's secret. Signing requires [`IssuerKey`], which
//! exists only with the `issuer` feature.

use crate::error::{LicenseError, LicenseResult};
use crate::key::{LicenseKey, LicensePayload, PAYLOAD_LEN};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, VerifyingKey, SIGNATURE_LENGTH};

/// Crockford base32 symbols.
const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Characters per dash-separated block.
pub const GROUP_LEN: usize = 5;

/// Length of a verifying or signing key in bytes.
pub const KEY_LEN: usize = 32;

/// Public verification key embedded in installed copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifierKey(VerifyingKey);

impl VerifierKey {
    /// Builds a verifier from raw public key bytes.
    pub fn from_bytes(bytes: &[u8; KEY_LEN]) -> LicenseResult<Self> {
        VerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|_| LicenseError::Config("invalid verifying key".to_string()))
    }

    /// Builds a verifier from a standard base64 string.
    pub fn from_base64(encoded: &str) -> LicenseResult<Self> {
        let raw = BASE64
            .decode(encoded.trim())
            .map_err(|e| LicenseError::Config(format!("invalid verifying key base64: {e}")))?;
        let bytes: [u8; KEY_LEN] = raw
            .as_slice()
            .try_into()
            .map_err(|_| LicenseError::Config("verifying key must be 32 bytes".to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Returns the raw public key bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; KEY_LEN] {
        self.0.to_bytes()
    }

    /// Returns the key as standard base64.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0.to_bytes())
    }
}

/// Secret signing key held only by the admin-side issuer.
#[cfg(any(test, feature = "issuer"))]
#[derive(Clone)]
pub struct IssuerKey(ed25519_dalek::SigningKey);

#[cfg(any(test, feature = "issuer"))]
impl IssuerKey {
    /// Generates a fresh random signing key.
    #[cfg(feature = "issuer")]
    #[must_use]
    pub fn generate() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// Creates a signing key from a raw 32-byte secret.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; KEY_LEN]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(bytes))
    }

    /// Returns the raw 32-byte secret.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; KEY_LEN] {
        self.0.to_bytes()
    }

    /// Derives the public verification half.
    #[must_use]
    pub fn verifier(&self) -> VerifierKey {
        VerifierKey(self.0.verifying_key())
    }
}

#[cfg(any(test, feature = "issuer"))]
impl std::fmt::Debug for IssuerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Signs `payload` and renders it as key text.
#[cfg(any(test, feature = "issuer"))]
#[must_use]
pub fn encode(payload: &LicensePayload, issuer: &IssuerKey) -> LicenseKey {
    use ed25519_dalek::Signer as _;

    let mut bytes = payload.to_bytes();
    let signature = issuer.0.sign(&bytes);
    bytes.extend_from_slice(&signature.to_bytes());
    LicenseKey::new(group(&base32_encode(&bytes)), *payload)
}

/// Parses key text and verifies its signature.
///
/// # Errors
///
/// Returns [`LicenseError::InvalidKey`] if the text is not canonical base32,
/// has the wrong length, carries a bad signature, or decodes to an
/// inconsistent payload.
pub fn decode(text: &str, verifier: &VerifierKey) -> LicenseResult<LicenseKey> {
    let bytes = base32_decode(text)?;
    if bytes.len() < PAYLOAD_LEN + SIGNATURE_LENGTH {
        return Err(LicenseError::InvalidKey("key too short".to_string()));
    }

    let (payload_bytes, sig_bytes) = bytes.split_at(bytes.len() - SIGNATURE_LENGTH);
    let signature = Signature::from_slice(sig_bytes)
        .map_err(|_| LicenseError::InvalidKey("invalid signature length".to_string()))?;

    verifier
        .0
        .verify_strict(payload_bytes, &signature)
        .map_err(|_| LicenseError::InvalidKey("signature mismatch".to_string()))?;

    let payload = LicensePayload::from_bytes(payload_bytes)?;
    Ok(LicenseKey::new(group(&base32_encode(&bytes)), payload))
}

/// Normalizes user-entered key text to its canonical form without verifying it.
pub fn canonicalize(text: &str) -> LicenseResult<String> {
    let bytes = base32_decode(text)?;
    Ok(group(&base32_encode(&bytes)))
}

fn base32_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for &byte in bytes {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

fn base32_decode(text: &str) -> LicenseResult<Vec<u8>> {
    let symbols: Vec<u8> = text
        .trim()
        .chars()
        .filter(|c| *c != '-')
        .map(symbol_value)
        .collect::<LicenseResult<_>>()?;
    if symbols.is_empty() {
        return Err(LicenseError::InvalidKey("key is empty".to_string()));
    }

    let total_bits = symbols.len() * 5;
    let byte_len = total_bits / 8;
    if total_bits - byte_len * 8 >= 5 {
        return Err(LicenseError::InvalidKey("invalid key length".to_string()));
    }

    let mut out = Vec::with_capacity(byte_len);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for value in symbols {
        buffer = (buffer << 5) | u32::from(value);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }
    if bits > 0 && buffer & ((1 << bits) - 1) != 0 {
        return Err(LicenseError::InvalidKey("non-canonical key ending".to_string()));
    }
    Ok(out)
}

fn symbol_value(c: char) -> LicenseResult<u8> {
    let upper = match c.to_ascii_uppercase() {
        'I' | 'L' => '1',
        'O' => '0',
        other => other,
    };
    ALPHABET
        .iter()
        .position(|&s| s as char == upper)
        .map(|i| i as u8)
        .ok_or_else(|| LicenseError::InvalidKey(format!("invalid character {c:?}")))
}

fn group(symbols: &str) -> String {
    let mut out = String::with_capacity(symbols.len() + symbols.len() / GROUP_LEN);
    for (i, c) in symbols.chars().enumerate() {
        if i > 0 && i % GROUP_LEN == 0 {
            out.push('-');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{BoundId, LicensePolicy, LicenseType};

    fn issuer() -> IssuerKey {
        IssuerKey::from_bytes(&[7u8; KEY_LEN])
    }

    fn sample() -> LicensePayload {
        LicensePayload::new(
            LicenseType::Trial,
            1_760_000_000,
            &LicensePolicy::default(),
            None,
        )
    }

    #[test]
    fn base32_roundtrip_all_lengths() {
        for len in 0..40u8 {
            let bytes: Vec<u8> = (0..len).map(|b| b.wrapping_mul(37)).collect();
            let text = base32_encode(&bytes);
            if len == 0 {
                assert!(base32_decode(&text).is_err());
            } else {
                assert_eq!(base32_decode(&text).unwrap(), bytes);
            }
        }
    }

    #[test]
    fn decode_is_case_insensitive() {
        let key = encode(&sample(), &issuer());
        let lower = key.as_str().to_ascii_lowercase();
        let decoded = decode(&lower, &issuer().verifier()).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn decode_ignores_grouping_and_whitespace() {
        let key = encode(&sample(), &issuer());
        let compact = format!("  {}\n", key.as_str().replace('-', ""));
        assert_eq!(decode(&compact, &issuer().verifier()).unwrap(), key);
    }

    #[test]
    fn ambiguous_letters_map_to_digits() {
        assert_eq!(symbol_value('o').unwrap(), 0);
        assert_eq!(symbol_value('I').unwrap(), 1);
        assert_eq!(symbol_value('l').unwrap(), 1);
        assert!(symbol_value('U').is_err());
        assert!(symbol_value('!').is_err());
    }

    #[test]
    fn key_text_is_grouped() {
        let key = encode(&sample(), &issuer());
        for block in key.as_str().split('-') {
            assert!(block.len() <= GROUP_LEN);
            assert!(block.chars().all(|c| ALPHABET.contains(&(c as u8))));
        }
    }

    #[test]
    fn wrong_verifier_rejected() {
        let key = encode(&sample(), &issuer());
        let other = IssuerKey::from_bytes(&[9u8; KEY_LEN]).verifier();
        assert!(matches!(
            decode(key.as_str(), &other),
            Err(LicenseError::InvalidKey(_))
        ));
    }

    #[test]
    fn nonzero_pad_bits_rejected() {
        let key = encode(&sample(), &issuer());
        let mut text: Vec<char> = key.as_str().chars().collect();
        // 83 bytes -> 133 symbols with 1 pad bit in the final symbol.
        let last = text.len() - 1;
        let value = symbol_value(text[last]).unwrap();
        text[last] = ALPHABET[(value | 1) as usize] as char;
        let mutated: String = text.into_iter().collect();
        if mutated != key.as_str() {
            assert!(decode(&mutated, &issuer().verifier()).is_err());
        }
    }

    #[test]
    fn bound_key_roundtrip() {
        let payload = LicensePayload::new(
            LicenseType::Yearly,
            1_760_000_000,
            &LicensePolicy::default(),
            Some(BoundId::derive("device-a")),
        );
        let key = encode(&payload, &issuer());
        assert_eq!(*decode(key.as_str(), &issuer().verifier()).unwrap().payload(), payload);
    }

    #[test]
    fn verifier_base64_roundtrip() {
        let verifier = issuer().verifier();
        let parsed = VerifierKey::from_base64(&verifier.to_base64()).unwrap();
        assert_eq!(parsed, verifier);
        assert!(VerifierKey::from_base64("c2hvcnQ=").is_err());
    }

    #[test]
    fn canonicalize_normalizes_case_and_grouping() {
        let key = encode(&sample(), &issuer());
        let messy = key.as_str().to_ascii_lowercase().replace('-', "");
        assert_eq!(canonicalize(&messy).unwrap(), key.as_str());
    }
}
