//! Progress reporting.
//!
//! Components receive a reporter at construction instead of writing to a
//! process-wide UI. The CLI wires in [`LogReporter`]; tests use
//! [`NullReporter`].

use crate::types::{CookbookDescriptor, DeploymentStatus, Stack};
use std::path::Path;
use tracing::info;

/// Hook points for user-visible progress across the pipeline phases.
///
/// All methods default to no-ops so implementations only override what
/// they present.
pub trait ProgressReporter: Send + Sync {
    /// A pipeline phase is starting.
    fn phase(&self, _message: &str) {}

    /// One stack finished analysis.
    fn stack_analyzed(&self, _stack: &Stack, _app_count: usize, _cookbook: Option<&str>) {}

    /// A cookbook artifact was packaged.
    fn cookbook_built(&self, _name: &str, _artifact: &Path) {}

    /// A cookbook artifact and its fingerprint were uploaded.
    fn cookbook_published(&self, _descriptor: &CookbookDescriptor) {}

    /// A deployment command was accepted by the fleet service.
    fn command_started(&self, _stack: &str, _command: &str, _deployment_id: &str) {}

    /// A deployment command reached a terminal status.
    fn command_finished(&self, _stack: &str, _command: &str, _status: DeploymentStatus) {}

    /// A stack's whole command sequence finished.
    fn stack_finished(&self, _stack: &str, _success: bool) {}
}

/// Reporter that emits structured log events via `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn phase(&self, message: &str) {
        info!("{}", message);
    }

    fn stack_analyzed(&self, stack: &Stack, app_count: usize, cookbook: Option<&str>) {
        info!(
            stack = %stack.name,
            apps = app_count,
            cookbook = cookbook.unwrap_or("-"),
            "Stack analyzed"
        );
    }

    fn cookbook_built(&self, name: &str, artifact: &Path) {
        info!(cookbook = name, artifact = %artifact.display(), "Cookbook packaged");
    }

    fn cookbook_published(&self, descriptor: &CookbookDescriptor) {
        info!(
            bucket = %descriptor.location,
            key = %descriptor.artifact_key,
            "Cookbook artifact published"
        );
    }

    fn command_started(&self, stack: &str, command: &str, deployment_id: &str) {
        info!(stack, command, deployment_id, "Deployment command dispatched");
    }

    fn command_finished(&self, stack: &str, command: &str, status: DeploymentStatus) {
        info!(stack, command, status = %status, "Deployment command finished");
    }

    fn stack_finished(&self, stack: &str, success: bool) {
        info!(stack, success, "Stack deployment finished");
    }
}

/// Reporter that discards all progress. Used in tests.
#[derive(Debug, Clone, Default)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {}
