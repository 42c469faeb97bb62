//! Shared fixtures: an issuer and a device validator on one simulated clock.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use keygate_issuer::Generator;
use keygate_license::{
    ActivationStore, DeviceFingerprint, IssuerKey, ManualClock, Registry, Validator,
};
use tempfile::TempDir;

/// Device identifier the fixture validator reports.
pub const DEVICE_ID: &str = "till-01";

/// Deterministic signing key from a fixed seed.
pub fn test_issuer() -> IssuerKey {
    let seed: [u8; 32] = [
        1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
        25, 26, 27, 28, 29, 30, 31, 32,
    ];
    IssuerKey::from_bytes(&seed)
}

/// Simulation start: 2025-10-01T00:00:00Z.
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap()
}

pub struct Fixture {
    pub dir: TempDir,
    pub clock: ManualClock,
    pub generator: Generator<ManualClock>,
    pub validator: Validator<ManualClock>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(start());
        let generator = Generator::new(
            test_issuer(),
            Registry::open_in_memory().unwrap(),
            clock.clone(),
        );
        let validator = open_validator(&dir, &clock);
        Self {
            dir,
            clock,
            generator,
            validator,
        }
    }

    /// A fresh validator over the same data directory, as after a restart.
    pub fn restart(&mut self) {
        self.validator = open_validator(&self.dir, &self.clock);
    }

    pub fn store(&self) -> ActivationStore {
        ActivationStore::in_dir(self.dir.path())
    }
}

fn open_validator(dir: &TempDir, clock: &ManualClock) -> Validator<ManualClock> {
    Validator::new(
        ActivationStore::in_dir(dir.path()),
        Registry::in_dir(dir.path()).unwrap(),
        test_issuer().verifier(),
        clock.clone(),
    )
    .with_device(DeviceFingerprint::from_id(DEVICE_ID))
}
