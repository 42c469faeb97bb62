use chrono::{Duration, Utc};
use keygate_license::{LicenseType, Registry, RegistryEntry, RegistryOutcome, REGISTRY_FILE};
use tempfile::TempDir;

#[test]
fn empty_registry() {
    let registry = Registry::open_in_memory().unwrap();
    assert!(registry.list().unwrap().is_empty());
    assert_eq!(registry.count().unwrap(), 0);
}

#[test]
fn list_preserves_insertion_order() {
    let registry = Registry::open_in_memory().unwrap();
    let now = Utc::now();
    // Recorded times deliberately out of order.
    let outcomes = [
        (RegistryOutcome::Generated, now + Duration::hours(2)),
        (RegistryOutcome::Activated, now),
        (RegistryOutcome::Reactivated, now + Duration::hours(1)),
    ];
    for (outcome, at) in outcomes {
        registry
            .append(&RegistryEntry::new("KEY", outcome, Some(LicenseType::Trial), at))
            .unwrap();
    }

    let listed: Vec<_> = registry.list().unwrap().into_iter().map(|e| e.outcome).collect();
    assert_eq!(
        listed,
        vec![
            RegistryOutcome::Generated,
            RegistryOutcome::Activated,
            RegistryOutcome::Reactivated
        ]
    );
}

#[test]
fn entry_fields_roundtrip() {
    let registry = Registry::open_in_memory().unwrap();
    let entry = RegistryEntry::new("ABCDE-FGHJK", RegistryOutcome::Rejected, None, Utc::now())
        .with_detail("signature mismatch");
    registry.append(&entry).unwrap();

    let listed = &registry.list().unwrap()[0];
    assert_eq!(listed.id, entry.id);
    assert_eq!(listed.key, "ABCDE-FGHJK");
    assert_eq!(listed.outcome, RegistryOutcome::Rejected);
    assert_eq!(listed.license_type, None);
    assert_eq!(listed.detail.as_deref(), Some("signature mismatch"));
    assert_eq!(
        listed.recorded_at.timestamp_millis(),
        entry.recorded_at.timestamp_millis()
    );
}

#[test]
fn persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let registry = Registry::in_dir(dir.path()).unwrap();
        registry
            .append(&RegistryEntry::new(
                "K",
                RegistryOutcome::Generated,
                Some(LicenseType::Yearly),
                Utc::now(),
            ))
            .unwrap();
    }
    assert!(dir.path().join(REGISTRY_FILE).exists());
    let registry = Registry::in_dir(dir.path()).unwrap();
    let entries = registry.list().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].license_type, Some(LicenseType::Yearly));
}

#[test]
fn entry_ids_are_unique() {
    let a = RegistryEntry::new("K", RegistryOutcome::Activated, None, Utc::now());
    let b = RegistryEntry::new("K", RegistryOutcome::Activated, None, Utc::now());
    assert_ne!(a.id, b.id);
    assert_eq!(a.id.get_version_num(), 7);
}

#[test]
fn entry_serializes_camel_case() {
    let entry = RegistryEntry::new("K", RegistryOutcome::DeviceMismatch, None, Utc::now());
    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["outcome"], "device_mismatch");
    assert!(json.get("recordedAt").is_some());
    assert!(json.get("licenseType").is_some());
}
