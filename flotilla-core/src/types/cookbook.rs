//! Cookbook descriptor types.
//!
//! A [`CookbookDescriptor`] ties a stack's declared cookbook source to the
//! local cookbook definition and the published artifact. Two stacks that
//! reference the same artifact key at the same store location collapse to a
//! single descriptor, so each artifact is built and published at most once
//! per invocation.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

/// Bucket-addressed location in the artifact store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreLocation {
    /// Bucket name
    pub bucket: String,
}

impl StoreLocation {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self { bucket: bucket.into() }
    }
}

impl std::fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.bucket)
    }
}

/// Everything needed to rebuild, republish, and reference one cookbook artifact.
///
/// Identity is `(location, artifact_key)`; the remaining fields are derived
/// state and do not participate in equality or hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookbookDescriptor {
    /// Artifact store location
    pub location: StoreLocation,

    /// Key of the packaged cookbook artifact
    pub artifact_key: String,

    /// Key of the fingerprint record for the artifact
    pub fingerprint_key: String,

    /// Declared cookbook name; `None` when no unambiguous local definition exists
    pub name: Option<String>,

    /// Local cookbook directory; `None` when no unambiguous local definition exists
    pub path: Option<PathBuf>,

    /// Fingerprint of the local cookbook source (empty when unknown)
    pub local_fingerprint: String,

    /// Last published fingerprint (empty when none was ever published)
    pub remote_fingerprint: String,
}

impl CookbookDescriptor {
    /// Whether the published artifact is out of date with the local source.
    ///
    /// An absent remote fingerprint reads as the empty string, so a cookbook
    /// that was never published is stale as soon as it has a local fingerprint.
    pub fn is_stale(&self) -> bool {
        !self.local_fingerprint.is_empty() && self.local_fingerprint != self.remote_fingerprint
    }

    /// Whether a local cookbook definition was located for this descriptor.
    ///
    /// Descriptors without one are reported but skipped by the build phase.
    pub fn is_buildable(&self) -> bool {
        self.name.is_some() && self.path.is_some()
    }

    /// File name component of the artifact key.
    pub fn artifact_file_name(&self) -> &str {
        self.artifact_key.rsplit('/').next().unwrap_or(&self.artifact_key)
    }
}

impl PartialEq for CookbookDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location && self.artifact_key == other.artifact_key
    }
}

impl Eq for CookbookDescriptor {}

impl Hash for CookbookDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.location.hash(state);
        self.artifact_key.hash(state);
    }
}
