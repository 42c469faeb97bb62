use keygate_license::{ErrorKind, LicenseError};

#[test]
fn error_display_invalid_key() {
    let err = LicenseError::InvalidKey("bad checksum".into());
    let msg = format!("{err}");
    assert!(msg.contains("invalid license key"));
    assert!(msg.contains("bad checksum"));
}

#[test]
fn error_display_device_mismatch() {
    let err = LicenseError::DeviceMismatch;
    assert!(format!("{err}").contains("different device"));
}

#[test]
fn error_display_storage_corrupt() {
    let err = LicenseError::StorageCorrupt("truncated".into());
    let msg = format!("{err}");
    assert!(msg.contains("corrupt"));
    assert!(msg.contains("truncated"));
}

#[test]
fn error_display_storage() {
    let err = LicenseError::Storage("disk full".into());
    assert!(format!("{err}").contains("storage"));
}

#[test]
fn error_display_registry() {
    let err = LicenseError::Registry("locked".into());
    assert!(format!("{err}").contains("registry"));
}

#[test]
fn error_from_serde_json() {
    let serde_err: Result<serde_json::Value, _> = serde_json::from_str("not json");
    let license_err: LicenseError = serde_err.unwrap_err().into();
    assert!(format!("{license_err}").contains("serialization"));
}

#[test]
fn kinds_for_boundary() {
    assert_eq!(LicenseError::InvalidKey(String::new()).kind(), ErrorKind::InvalidKey);
    assert_eq!(LicenseError::DeviceMismatch.kind(), ErrorKind::DeviceMismatch);
    assert_eq!(LicenseError::StorageCorrupt(String::new()).kind(), ErrorKind::Storage);
    assert_eq!(LicenseError::Config(String::new()).kind(), ErrorKind::Internal);
}

#[test]
fn clock_tampering_reported_as_expiry() {
    assert_eq!(LicenseError::ClockTampered.kind(), ErrorKind::Expired);
    let json = serde_json::to_string(&LicenseError::ClockTampered.kind()).unwrap();
    assert!(!json.contains("clock"));
}
