use keygate_license::{LicenseConfig, LicensePolicy, VerifierKey};

fn verifying_key() -> String {
    let signing = ed25519_dalek::SigningKey::from_bytes(&[42u8; 32]);
    VerifierKey::from_bytes(&signing.verifying_key().to_bytes())
        .unwrap()
        .to_base64()
}

#[test]
fn minimal_config_uses_defaults() {
    let config =
        LicenseConfig::from_toml_str(&format!("verifying_key = \"{}\"", verifying_key())).unwrap();
    assert!(config.device_binding);
    assert_eq!(config.policy, LicensePolicy::default());
    assert!(config.data_dir.ends_with("keygate"));
}

#[test]
fn full_config() {
    let source = format!(
        r#"
        verifying_key = "{}"
        data_dir = "/tmp/keygate-test"
        device_binding = false

        [policy]
        trial_days = 7
        "#,
        verifying_key()
    );
    let config = LicenseConfig::from_toml_str(&source).unwrap();
    assert!(!config.device_binding);
    assert_eq!(config.data_dir, std::path::PathBuf::from("/tmp/keygate-test"));
    assert_eq!(config.policy.trial_days, 7);
    assert_eq!(config.policy.yearly_days, 365);
}

#[test]
fn bad_verifying_key_rejected() {
    assert!(LicenseConfig::from_toml_str(r#"verifying_key = "not-base64!""#).is_err());
    assert!(LicenseConfig::from_toml_str(r#"verifying_key = "c2hvcnQ=""#).is_err());
}

#[test]
fn missing_verifying_key_rejected() {
    assert!(LicenseConfig::from_toml_str("device_binding = true").is_err());
}

#[test]
fn zero_day_policy_rejected() {
    let source = format!(
        "verifying_key = \"{}\"\n[policy]\nmonthly_days = 0\n",
        verifying_key()
    );
    assert!(LicenseConfig::from_toml_str(&source).is_err());
}

#[test]
fn load_from_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("license.toml");
    std::fs::write(&path, format!("verifying_key = \"{}\"", verifying_key())).unwrap();
    let config = LicenseConfig::load(&path).unwrap();
    assert_eq!(config.verifier().unwrap().to_base64(), verifying_key());
}

#[test]
fn load_missing_file_fails() {
    assert!(LicenseConfig::load(std::path::Path::new("/nonexistent/license.toml")).is_err());
}
