//! Artifact publishing.

use crate::clients::ObjectStore;
use crate::error::{FlotillaError, Result};
use crate::report::ProgressReporter;
use crate::types::CookbookDescriptor;
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

/// Uploads packaged artifacts and their fingerprint records.
///
/// Publish failures are reported by the caller and never abort the
/// invocation: the unchanged fingerprint record keeps the artifact stale,
/// so the next run retries.
pub struct ArtifactPublisher {
    store: Arc<dyn ObjectStore>,
    reporter: Arc<dyn ProgressReporter>,
}

impl ArtifactPublisher {
    /// Create a new publisher.
    pub fn new(store: Arc<dyn ObjectStore>, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self { store, reporter }
    }

    /// Upload the artifact at `artifact` and the local fingerprint record.
    #[instrument(skip(self, descriptor, artifact), fields(key = %descriptor.artifact_key))]
    pub async fn publish(&self, descriptor: &CookbookDescriptor, artifact: &Path) -> Result<()> {
        let publish_err = |e: FlotillaError| FlotillaError::Publish {
            artifact_key: descriptor.artifact_key.clone(),
            reason: e.to_string(),
        };

        let bytes = tokio::fs::read(artifact)
            .await
            .map_err(|e| FlotillaError::Io { path: artifact.to_path_buf(), source: e })
            .map_err(publish_err)?;
        self.store
            .put(&descriptor.location, &descriptor.artifact_key, bytes)
            .await
            .map_err(publish_err)?;
        self.store
            .put(
                &descriptor.location,
                &descriptor.fingerprint_key,
                descriptor.local_fingerprint.clone().into_bytes(),
            )
            .await
            .map_err(publish_err)?;

        self.reporter.cookbook_published(descriptor);
        Ok(())
    }
}
