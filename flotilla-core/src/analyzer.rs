//! Stack analysis: which stacks get deployed, and which cookbook artifacts
//! are stale.
//!
//! Analysis is read-only and deterministic given unchanged remote/local
//! state. Any failure while describing a stack or listing its apps aborts
//! the whole call: acting on a partial analysis is unsafe.

use crate::clients::{FingerprintSource, FleetClient, ObjectStore};
use crate::error::{FlotillaError, Result};
use crate::metadata::{discover_cookbooks, read_metadata};
use crate::report::ProgressReporter;
use crate::types::{AnalysisResult, CookbookDescriptor, DeployTarget, Stack, StoreLocation};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Source types the analyzer knows how to derive an artifact location from.
const RECOGNIZED_SOURCE_KINDS: &[&str] = &["s3"];

/// Suffix of the fingerprint record stored next to each artifact.
const FINGERPRINT_SUFFIX: &str = ".fingerprint";

/// Inspects stacks and produces deploy targets plus the stale cookbook set.
pub struct StackAnalyzer {
    fleet: Arc<dyn FleetClient>,
    store: Arc<dyn ObjectStore>,
    fingerprints: Arc<dyn FingerprintSource>,
    reporter: Arc<dyn ProgressReporter>,
    cookbook_root: PathBuf,
}

impl StackAnalyzer {
    /// Create a new analyzer.
    ///
    /// # Arguments
    /// * `fleet` - fleet-management service client
    /// * `store` - artifact store client, for remote fingerprints
    /// * `fingerprints` - local content fingerprint source
    /// * `reporter` - progress reporting collaborator
    /// * `cookbook_root` - directory holding local cookbook definitions
    pub fn new(
        fleet: Arc<dyn FleetClient>,
        store: Arc<dyn ObjectStore>,
        fingerprints: Arc<dyn FingerprintSource>,
        reporter: Arc<dyn ProgressReporter>,
        cookbook_root: impl Into<PathBuf>,
    ) -> Self {
        Self { fleet, store, fingerprints, reporter, cookbook_root: cookbook_root.into() }
    }

    /// Analyze all given stacks.
    ///
    /// Stale descriptors are deduplicated by `(location, artifact key)`
    /// identity, preserving first-seen order, so an artifact referenced by
    /// several stacks is built and published once.
    #[instrument(skip(self))]
    pub async fn analyze(&self, stack_ids: &[String]) -> Result<AnalysisResult> {
        let mut stale_cookbooks: Vec<CookbookDescriptor> = Vec::new();
        let mut targets = Vec::new();

        for stack_id in stack_ids {
            let stack = self
                .fleet
                .describe_stack(stack_id)
                .await
                .map_err(FlotillaError::analysis)?;
            let apps = self
                .fleet
                .list_apps(stack_id)
                .await
                .map_err(FlotillaError::analysis)?;
            let cookbook = self.analyze_cookbook(&stack).await?;

            self.reporter.stack_analyzed(
                &stack,
                apps.len(),
                cookbook.as_ref().and_then(|c| c.name.as_deref()),
            );

            if let Some(descriptor) = &cookbook {
                if descriptor.is_stale() && !stale_cookbooks.contains(descriptor) {
                    stale_cookbooks.push(descriptor.clone());
                }
            }
            targets.push(DeployTarget { stack, apps, cookbook });
        }

        Ok(AnalysisResult { stale_cookbooks, targets })
    }

    /// Derive the cookbook descriptor for one stack, if it has one.
    ///
    /// Returns `None` when the stack declares no cookbook source or a source
    /// type the system does not recognize.
    async fn analyze_cookbook(&self, stack: &Stack) -> Result<Option<CookbookDescriptor>> {
        let Some(source) = &stack.cookbook_source else {
            debug!(stack = %stack.name, "No cookbook source declared");
            return Ok(None);
        };
        if !RECOGNIZED_SOURCE_KINDS.contains(&source.kind.as_str()) {
            debug!(stack = %stack.name, kind = %source.kind, "Unrecognized cookbook source type");
            return Ok(None);
        }
        let Some((location, artifact_key)) = parse_source_url(&source.url) else {
            debug!(stack = %stack.name, url = %source.url, "Cookbook source URL not parseable");
            return Ok(None);
        };

        let fingerprint_key = fingerprint_key_for(&artifact_key);
        let cookbook_name = artifact_stem(&artifact_key);
        let (name, path) = self.locate_cookbook(&cookbook_name)?;

        let local_fingerprint = match &path {
            Some(path) => self
                .fingerprints
                .fingerprint(path)
                .await
                .map_err(FlotillaError::analysis)?,
            None => String::new(),
        };
        // Missing fingerprint record means the artifact was never published.
        let remote_fingerprint = match self
            .store
            .get(&location, &fingerprint_key)
            .await
            .map_err(FlotillaError::analysis)?
        {
            Some(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
            None => String::new(),
        };

        Ok(Some(CookbookDescriptor {
            location,
            artifact_key,
            fingerprint_key,
            name,
            path,
            local_fingerprint,
            remote_fingerprint,
        }))
    }

    /// Find the single local cookbook definition declaring `cookbook_name`.
    ///
    /// Zero or multiple candidates is non-fatal: the descriptor is produced
    /// without a buildable name/path and skipped by the build phase.
    fn locate_cookbook(&self, cookbook_name: &str) -> Result<(Option<String>, Option<PathBuf>)> {
        let mut candidates = Vec::new();
        for dir in discover_cookbooks(&self.cookbook_root)? {
            let metadata = read_metadata(&dir)?;
            if metadata.name.as_deref() == Some(cookbook_name) {
                candidates.push(dir);
            }
        }
        match candidates.len() {
            1 => {
                let path = candidates.remove(0);
                Ok((Some(cookbook_name.to_string()), Some(path)))
            }
            0 => {
                warn!(cookbook = cookbook_name, "No local cookbook definition found");
                Ok((None, None))
            }
            n => {
                warn!(cookbook = cookbook_name, candidates = n, "Ambiguous cookbook definition");
                Ok((None, None))
            }
        }
    }
}

/// Split a source URL into store location and artifact key.
///
/// Accepts `s3://bucket/key...` and `http(s)://host/bucket/key...`; the key
/// is everything after the first path separator following the bucket
/// segment.
fn parse_source_url(url: &str) -> Option<(StoreLocation, String)> {
    let rest = url
        .strip_prefix("s3://")
        .or_else(|| {
            // Path-style store URL: skip the host segment.
            url.strip_prefix("https://")
                .or_else(|| url.strip_prefix("http://"))
                .and_then(|r| r.split_once('/'))
                .map(|(_, rest)| rest)
        })?;
    let (bucket, key) = rest.split_once('/')?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    Some((StoreLocation::new(bucket), key.to_string()))
}

/// Fingerprint record key: the artifact key with its extension run replaced.
fn fingerprint_key_for(artifact_key: &str) -> String {
    format!("{}{}", strip_extensions(artifact_key), FINGERPRINT_SUFFIX)
}

/// Cookbook name derived from the artifact key's file name.
fn artifact_stem(artifact_key: &str) -> String {
    let file_name = artifact_key.rsplit('/').next().unwrap_or(artifact_key);
    strip_extensions(file_name).to_string()
}

/// Strip the trailing extension run (`.tar.gz`, `.tgz`, `.zip`, ...) from a key.
fn strip_extensions(key: &str) -> &str {
    let file_start = key.rfind('/').map_or(0, |i| i + 1);
    match key[file_start..].find('.') {
        Some(dot) if dot > 0 => &key[..file_start + dot],
        _ => key,
    }
}
