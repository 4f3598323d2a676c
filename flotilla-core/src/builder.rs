//! Cookbook packaging.
//!
//! Vendors a cookbook and its transitive dependencies into an isolated
//! working directory, synthesizes a minimal manifest pinning only the
//! target cookbook, and packages the tree into one gzipped tar artifact.
//!
//! The working directory is shared across builds, so builds must run
//! sequentially; the orchestrator never overlaps two of them.

use crate::error::{FlotillaError, Result};
use crate::metadata::{read_metadata, METADATA_FILE};
use crate::types::CookbookDescriptor;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Name of the synthesized manifest placed at the archive root.
const MANIFEST_FILE: &str = "manifest.json";

/// Packages cookbook artifacts in a local working directory.
pub struct CookbookBuilder {
    build_root: PathBuf,
}

impl CookbookBuilder {
    /// Create a builder owning `build_root` as its working directory.
    pub fn new(build_root: impl Into<PathBuf>) -> Self {
        Self { build_root: build_root.into() }
    }

    /// Build the artifact for `descriptor` and return its local path.
    ///
    /// Not safe to call concurrently: the staging area is recreated per
    /// build.
    #[instrument(skip(self, descriptor), fields(artifact = %descriptor.artifact_key))]
    pub fn build(&self, descriptor: &CookbookDescriptor) -> Result<PathBuf> {
        let (name, path) = match (&descriptor.name, &descriptor.path) {
            (Some(name), Some(path)) => (name.as_str(), path.as_path()),
            _ => {
                return Err(FlotillaError::Build {
                    cookbook: descriptor.artifact_key.clone(),
                    reason: "no unambiguous local cookbook definition".to_string(),
                })
            }
        };

        let staging = self.build_root.join("vendor");
        if staging.exists() {
            std::fs::remove_dir_all(&staging)
                .map_err(|e| FlotillaError::Io { path: staging.clone(), source: e })?;
        }
        std::fs::create_dir_all(&staging)
            .map_err(|e| FlotillaError::Io { path: staging.clone(), source: e })?;

        self.vendor(name, path, &staging)?;
        self.write_manifest(name, descriptor, &staging)?;

        let artifact = self.build_root.join(descriptor.artifact_file_name());
        package_directory(&staging, &artifact)?;
        info!(cookbook = name, artifact = %artifact.display(), "Cookbook packaged");
        Ok(artifact)
    }

    /// Copy the target cookbook and its transitive `depends` into `staging`.
    ///
    /// Dependencies are resolved among the sibling directories of the target
    /// cookbook. A dependency without a local definition is skipped: the
    /// recipe engine resolves it from its own sources at deploy time.
    fn vendor(&self, name: &str, path: &Path, staging: &Path) -> Result<()> {
        let cookbook_root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut staged = BTreeSet::new();
        let mut queue = vec![(name.to_string(), path.to_path_buf())];

        while let Some((cookbook, dir)) = queue.pop() {
            if !staged.insert(cookbook.clone()) {
                continue;
            }
            copy_dir(&dir, &staging.join(&cookbook))?;
            for dependency in read_metadata(&dir)?.depends {
                let dependency_dir = cookbook_root.join(&dependency);
                if dependency_dir.join(METADATA_FILE).is_file() {
                    queue.push((dependency, dependency_dir));
                } else {
                    debug!(cookbook = %cookbook, dependency = %dependency, "Dependency not vendored locally");
                }
            }
        }
        Ok(())
    }

    /// Write the manifest pinning only the target cookbook.
    fn write_manifest(
        &self,
        name: &str,
        descriptor: &CookbookDescriptor,
        staging: &Path,
    ) -> Result<()> {
        let manifest = serde_json::json!({
            "cookbooks": [{
                "name": name,
                "fingerprint": descriptor.local_fingerprint,
            }],
        });
        let path = staging.join(MANIFEST_FILE);
        std::fs::write(&path, serde_json::to_vec_pretty(&manifest).unwrap_or_default())
            .map_err(|e| FlotillaError::Io { path, source: e })
    }

    /// Delete build outputs and the working directory. Best-effort.
    pub fn cleanup(&self) {
        if let Err(e) = std::fs::remove_dir_all(&self.build_root) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.build_root.display(), error = %e, "Failed to clean build directory");
            }
        }
    }
}

/// Package `dir` into a gzipped tar archive at `artifact`.
///
/// Top-level entries of `dir` land at the archive root.
fn package_directory(dir: &Path, artifact: &Path) -> Result<()> {
    let io_err = |e| FlotillaError::Io { path: artifact.to_path_buf(), source: e };
    let file = File::create(artifact).map_err(io_err)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut archive = tar::Builder::new(encoder);

    let entries = std::fs::read_dir(dir)
        .map_err(|e| FlotillaError::Io { path: dir.to_path_buf(), source: e })?;
    for entry in entries {
        let entry = entry.map_err(|e| FlotillaError::Io { path: dir.to_path_buf(), source: e })?;
        let path = entry.path();
        if path.is_dir() {
            archive.append_dir_all(entry.file_name(), &path).map_err(io_err)?;
        } else {
            archive.append_path_with_name(&path, entry.file_name()).map_err(io_err)?;
        }
    }
    archive
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(io_err)?;
    Ok(())
}

/// Recursively copy `src` into `dst`.
fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)
        .map_err(|e| FlotillaError::Io { path: dst.to_path_buf(), source: e })?;
    let entries =
        std::fs::read_dir(src).map_err(|e| FlotillaError::Io { path: src.to_path_buf(), source: e })?;
    for entry in entries {
        let entry =
            entry.map_err(|e| FlotillaError::Io { path: src.to_path_buf(), source: e })?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        if from.is_dir() {
            copy_dir(&from, &to)?;
        } else {
            std::fs::copy(&from, &to)
                .map_err(|e| FlotillaError::Io { path: from.clone(), source: e })?;
        }
    }
    Ok(())
}
