//! Property-based tests for license key encoding.
//!
//! These verify properties that must always hold:
//! - Every valid payload survives encode/decode unchanged
//! - Changing or dropping any single symbol breaks the key
//! - Typing a look-alike letter (I, L for 1; O for 0) is not a change: it
//!   reads as the same key
//! - A key from another issuer never verifies

mod common;

use common::test_issuer;
use keygate_license::{
    decode, encode, BoundId, IssuerKey, LicenseError, LicensePayload, LicensePolicy, LicenseType,
};
use proptest::prelude::*;
use proptest::sample::Index;

const SYMBOLS: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

fn license_type_strategy() -> impl Strategy<Value = LicenseType> {
    prop_oneof![
        Just(LicenseType::Trial),
        Just(LicenseType::Monthly),
        Just(LicenseType::Yearly),
    ]
}

fn payload_strategy() -> impl Strategy<Value = LicensePayload> {
    (
        license_type_strategy(),
        0i64..4_000_000_000,
        proptest::option::of(prop::array::uniform16(any::<u8>())),
    )
        .prop_map(|(license_type, issued_at, bound)| {
            LicensePayload::new(
                license_type,
                issued_at,
                &LicensePolicy::default(),
                bound.map(BoundId::from_bytes),
            )
        })
}

/// Replaces the character at `index` with a different canonical symbol.
fn mutate(text: &str, index: Index, shift: usize) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    let i = index.index(chars.len());
    let original = SYMBOLS.iter().position(|&s| s as char == chars[i]);
    chars[i] = match original {
        Some(pos) => SYMBOLS[(pos + 1 + shift) % SYMBOLS.len()] as char,
        None => SYMBOLS[shift] as char,
    };
    chars.into_iter().collect()
}

// =============================================================================
// ENCODING PROPERTIES
// =============================================================================

proptest! {
    /// decode(encode(p)) == p
    #[test]
    fn roundtrip_preserves_payload(payload in payload_strategy()) {
        let issuer = test_issuer();
        let key = encode(&payload, &issuer);
        let decoded = decode(key.as_str(), &issuer.verifier()).unwrap();
        prop_assert_eq!(*decoded.payload(), payload);
        prop_assert_eq!(decoded.as_str(), key.as_str());
    }

    /// Any single substituted symbol fails verification.
    ///
    /// Substitutions draw from the canonical alphabet only. Look-alike
    /// letters decode to the symbol they resemble; see
    /// `alias_substitution_reads_as_same_key`.
    #[test]
    fn single_substitution_rejected(
        payload in payload_strategy(),
        index in any::<Index>(),
        shift in 0usize..31,
    ) {
        let issuer = test_issuer();
        let key = encode(&payload, &issuer);
        let mutated = mutate(key.as_str(), index, shift);
        prop_assert_ne!(&mutated, key.as_str());

        let result = decode(&mutated, &issuer.verifier());
        prop_assert!(matches!(result, Err(LicenseError::InvalidKey(_))));
    }

    /// Dropping any single symbol fails verification.
    #[test]
    fn single_deletion_rejected(payload in payload_strategy(), index in any::<Index>()) {
        let issuer = test_issuer();
        let key = encode(&payload, &issuer);
        let compact: Vec<char> = key.as_str().chars().filter(|c| *c != '-').collect();
        let i = index.index(compact.len());
        let shortened: String = compact
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, c)| *c)
            .collect();

        prop_assert!(decode(&shortened, &issuer.verifier()).is_err());
    }

    /// Keys signed by a different secret never verify.
    #[test]
    fn foreign_issuer_rejected(payload in payload_strategy(), seed in any::<[u8; 32]>()) {
        let foreign = IssuerKey::from_bytes(&seed);
        prop_assume!(foreign.verifier() != test_issuer().verifier());
        let key = encode(&payload, &foreign);
        prop_assert!(decode(key.as_str(), &test_issuer().verifier()).is_err());
    }

    /// Swapping a `1` for I or L, or a `0` for O, in either case, yields
    /// the identical canonical key.
    #[test]
    fn alias_substitution_reads_as_same_key(
        payload in payload_strategy(),
        index in any::<Index>(),
        pick in 0usize..3,
    ) {
        let issuer = test_issuer();
        let key = encode(&payload, &issuer);
        let chars: Vec<char> = key.as_str().chars().collect();
        let positions: Vec<usize> = chars
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, '0' | '1'))
            .map(|(i, _)| i)
            .collect();
        prop_assume!(!positions.is_empty());

        let i = positions[index.index(positions.len())];
        let mut typed = chars.clone();
        typed[i] = match (chars[i], pick) {
            ('1', 0) => 'I',
            ('1', 1) => 'l',
            ('1', _) => 'L',
            (_, 0) => 'O',
            _ => 'o',
        };
        let typed: String = typed.into_iter().collect();
        prop_assert_ne!(&typed, key.as_str());

        let decoded = decode(&typed, &issuer.verifier()).unwrap();
        prop_assert_eq!(decoded.as_str(), key.as_str());
        prop_assert_eq!(*decoded.payload(), payload);
    }

    /// Arbitrary input never panics the decoder.
    #[test]
    fn arbitrary_text_never_panics(text in "\\PC{0,200}") {
        let _ = decode(&text, &test_issuer().verifier());
    }
}

#[test]
fn keys_are_transcribable() {
    let key = encode(
        &LicensePayload::new(LicenseType::Yearly, 1_700_000_000, &LicensePolicy::default(), None),
        &test_issuer(),
    );
    assert!(key
        .as_str()
        .chars()
        .all(|c| c == '-' || SYMBOLS.contains(&(c as u8))));
    assert!(!key.as_str().contains(|c: char| matches!(c, 'I' | 'L' | 'O' | 'U')));
}
