//! Deployment orchestration.
//!
//! Sequences the pipeline: analysis, sequential cookbook build/publish,
//! cleanup, then one concurrent task per deploy target with failure
//! aggregation. The orchestrator depends only on the [`Deployer`] trait, so
//! deployers for other fleet-management backends slot in unchanged.

use crate::analyzer::StackAnalyzer;
use crate::builder::CookbookBuilder;
use crate::dispatcher::DeploymentDispatcher;
use crate::error::{FlotillaError, Result};
use crate::publisher::ArtifactPublisher;
use crate::report::ProgressReporter;
use crate::types::{AnalysisResult, CookbookDescriptor, DeployTarget};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Backend-specific deployment operations.
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Analyze the given stacks into targets and the stale cookbook set.
    async fn analyze(&self, stack_ids: &[String]) -> Result<AnalysisResult>;

    /// Build and publish one stale cookbook artifact.
    async fn deploy_cookbook(&self, descriptor: &CookbookDescriptor) -> Result<()>;

    /// Run the full command sequence for one deploy target.
    async fn deploy_target(
        &self,
        target: &DeployTarget,
        stale_cookbooks: &[CookbookDescriptor],
    ) -> Result<()>;

    /// Delete local build artifacts and working directories. Best-effort.
    fn cleanup(&self) {}
}

/// Deployer for the fleet-management service, composed from the concrete
/// pipeline components.
pub struct FleetDeployer {
    analyzer: StackAnalyzer,
    builder: CookbookBuilder,
    publisher: ArtifactPublisher,
    dispatcher: DeploymentDispatcher,
}

impl FleetDeployer {
    /// Create a deployer from its pipeline components.
    pub fn new(
        analyzer: StackAnalyzer,
        builder: CookbookBuilder,
        publisher: ArtifactPublisher,
        dispatcher: DeploymentDispatcher,
    ) -> Self {
        Self { analyzer, builder, publisher, dispatcher }
    }
}

#[async_trait]
impl Deployer for FleetDeployer {
    async fn analyze(&self, stack_ids: &[String]) -> Result<AnalysisResult> {
        self.analyzer.analyze(stack_ids).await
    }

    async fn deploy_cookbook(&self, descriptor: &CookbookDescriptor) -> Result<()> {
        let artifact = self.builder.build(descriptor)?;
        self.publisher.publish(descriptor, &artifact).await
    }

    async fn deploy_target(
        &self,
        target: &DeployTarget,
        stale_cookbooks: &[CookbookDescriptor],
    ) -> Result<()> {
        self.dispatcher.run(target, stale_cookbooks).await
    }

    fn cleanup(&self) {
        self.builder.cleanup();
    }
}

/// Aggregated outcome of one orchestrated invocation.
#[derive(Debug, Default)]
pub struct DeployReport {
    /// Names of stacks whose command sequence completed.
    pub succeeded: Vec<String>,

    /// Names and errors of stacks whose task failed.
    pub failed: Vec<(String, FlotillaError)>,
}

impl DeployReport {
    /// Whether every stack's task succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Sequences analysis, build/publish, and concurrent per-stack dispatch.
pub struct Orchestrator {
    deployer: Arc<dyn Deployer>,
    reporter: Arc<dyn ProgressReporter>,
}

impl Orchestrator {
    /// Create an orchestrator over a deployer.
    pub fn new(deployer: Arc<dyn Deployer>, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self { deployer, reporter }
    }

    /// Deploy all given stacks.
    ///
    /// Analysis errors abort immediately. Cookbook build/publish failures
    /// are logged and skipped: the fingerprint comparison marks the artifact
    /// stale again on the next run. Dispatch failures are isolated per
    /// stack and collected into the report; one failing stack never cancels
    /// its siblings.
    #[instrument(skip(self))]
    pub async fn deploy(&self, stack_ids: &[String]) -> Result<DeployReport> {
        self.reporter.phase("Analyzing stacks");
        let analysis = self.deployer.analyze(stack_ids).await?;
        info!(
            stacks = analysis.targets.len(),
            stale_cookbooks = analysis.stale_cookbooks.len(),
            "Analysis complete"
        );

        // Shared build directory: strictly sequential.
        self.reporter.phase("Publishing stale cookbooks");
        for descriptor in &analysis.stale_cookbooks {
            if !descriptor.is_buildable() {
                warn!(key = %descriptor.artifact_key, "Skipping cookbook without a local definition");
                continue;
            }
            if let Err(e) = self.deployer.deploy_cookbook(descriptor).await {
                warn!(key = %descriptor.artifact_key, error = %e, "Cookbook publish failed; will retry next run");
            }
        }
        // Cleanup runs even when some publishes failed.
        self.deployer.cleanup();

        self.reporter.phase("Deploying stacks");
        let stale = Arc::new(analysis.stale_cookbooks);
        let mut handles = Vec::new();
        for target in analysis.targets {
            let deployer = Arc::clone(&self.deployer);
            let stale = Arc::clone(&stale);
            let stack_name = target.stack.name.clone();
            let handle =
                tokio::spawn(async move { deployer.deploy_target(&target, &stale).await });
            handles.push((stack_name, handle));
        }

        let mut report = DeployReport::default();
        for (stack_name, handle) in handles {
            let outcome = match handle.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e),
                Err(e) => Err(FlotillaError::TaskPanicked { reason: e.to_string() }),
            };
            match outcome {
                Ok(()) => {
                    self.reporter.stack_finished(&stack_name, true);
                    report.succeeded.push(stack_name);
                }
                Err(e) => {
                    self.reporter.stack_finished(&stack_name, false);
                    error!(stack = %stack_name, error = %e, "Stack deployment failed");
                    report.failed.push((stack_name, e));
                }
            }
        }
        Ok(report)
    }
}
