//! External collaborator abstractions.
//!
//! Every remote dependency sits behind a trait so components receive an
//! explicit client handle at construction instead of reaching for ambient
//! state, and so tests can swap in in-memory fakes:
//! - [`FleetClient`]: the fleet-management service (stacks, apps, deployments)
//! - [`ObjectStore`]: the artifact store (packaged cookbooks + fingerprints)
//! - [`FingerprintSource`]: version control, for local content fingerprints

use crate::error::Result;
use crate::types::{App, DeploymentStatus, Stack, StoreLocation};
use async_trait::async_trait;
use std::path::Path;

pub mod git;
pub mod http;

pub use git::GitFingerprint;
pub use http::{HttpFleetClient, HttpObjectStore};

/// Client for the remote fleet-management service.
#[async_trait]
pub trait FleetClient: Send + Sync {
    /// Fetch one stack by id, including its declared cookbook source.
    async fn describe_stack(&self, stack_id: &str) -> Result<Stack>;

    /// List the apps declared on a stack, in declared order.
    async fn list_apps(&self, stack_id: &str) -> Result<Vec<App>>;

    /// Create a deployment and return its id.
    ///
    /// Returns `Ok(None)` when the stack has no eligible running instances
    /// to execute the command on.
    async fn create_deployment(
        &self,
        stack_id: &str,
        app_id: Option<&str>,
        command: &str,
    ) -> Result<Option<String>>;

    /// Look up the current status of a deployment.
    ///
    /// Returns `Ok(None)` when the service has no record matching the id.
    async fn deployment_status(&self, deployment_id: &str) -> Result<Option<DeploymentStatus>>;
}

/// Client for the artifact store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload an object as private/non-public.
    async fn put(&self, location: &StoreLocation, key: &str, body: Vec<u8>) -> Result<()>;

    /// Fetch an object body; `Ok(None)` when the key does not exist.
    async fn get(&self, location: &StoreLocation, key: &str) -> Result<Option<Vec<u8>>>;
}

/// Source of local content fingerprints.
#[async_trait]
pub trait FingerprintSource: Send + Sync {
    /// Fingerprint of the latest change affecting `path`.
    ///
    /// Returns an empty string when no history exists for the path.
    async fn fingerprint(&self, path: &Path) -> Result<String>;
}
