//! Signing secret storage: a single line of base64, readable by owner only.

use crate::error::{IssuerError, IssuerResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use keygate_license::IssuerKey;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::info;
use zeroize::Zeroizing;

/// Writes `issuer` to a new file at `path`. Refuses to overwrite.
pub fn write_secret(path: &Path, issuer: &IssuerKey) -> IssuerResult<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path).map_err(|e| {
        IssuerError::SecretKey(format!("cannot create {}: {e}", path.display()))
    })?;

    let raw = Zeroizing::new(issuer.to_bytes());
    let encoded = Zeroizing::new(BASE64.encode(raw.as_slice()));
    file.write_all(encoded.as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_all()?;

    info!(path = %path.display(), "wrote issuer secret");
    Ok(())
}

/// Reads the signing secret at `path`.
pub fn read_secret(path: &Path) -> IssuerResult<IssuerKey> {
    let text = Zeroizing::new(fs::read_to_string(path).map_err(|e| {
        IssuerError::SecretKey(format!("cannot read {}: {e}", path.display()))
    })?);
    let raw = Zeroizing::new(
        BASE64
            .decode(text.trim())
            .map_err(|e| IssuerError::SecretKey(format!("invalid base64: {e}")))?,
    );
    let bytes: Zeroizing<[u8; 32]> = Zeroizing::new(
        raw.as_slice()
            .try_into()
            .map_err(|_| IssuerError::SecretKey("secret must be 32 bytes".to_string()))?,
    );
    Ok(IssuerKey::from_bytes(&bytes))
}
