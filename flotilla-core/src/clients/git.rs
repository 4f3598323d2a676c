//! Git-backed fingerprint source.

use crate::clients::FingerprintSource;
use crate::error::{FlotillaError, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Fingerprints a local path with the hash of the last commit touching it.
#[derive(Debug, Clone, Default)]
pub struct GitFingerprint;

impl GitFingerprint {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FingerprintSource for GitFingerprint {
    async fn fingerprint(&self, path: &Path) -> Result<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(path)
            .args(["log", "-n", "1", "--format=%H", "--", "."])
            .output()
            .await
            .map_err(|e| FlotillaError::Fingerprint {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(FlotillaError::Fingerprint {
                path: path.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let fingerprint = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(path = %path.display(), %fingerprint, "Resolved local fingerprint");
        Ok(fingerprint)
    }
}
