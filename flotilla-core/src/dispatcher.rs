//! Per-stack deployment dispatch.
//!
//! Drives one stack's command sequence to completion: issue a command,
//! poll its deployment to a terminal status, move on. A failed terminal
//! status aborts the remaining commands for that stack; there are no
//! retries. Commands across different stacks carry no ordering guarantee.

use crate::clients::FleetClient;
use crate::error::{FlotillaError, Result};
use crate::report::ProgressReporter;
use crate::types::{CookbookDescriptor, DeployTarget, DeploymentCommand, DeploymentStatus, Stack};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Default wait between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Issues ordered commands to one stack and polls each to a terminal state.
pub struct DeploymentDispatcher {
    fleet: Arc<dyn FleetClient>,
    reporter: Arc<dyn ProgressReporter>,
    poll_interval: Duration,
    deadline: Option<Duration>,
}

impl DeploymentDispatcher {
    /// Create a dispatcher with the default poll interval and no deadline.
    pub fn new(fleet: Arc<dyn FleetClient>, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self { fleet, reporter, poll_interval: DEFAULT_POLL_INTERVAL, deadline: None }
    }

    /// Override the wait between status polls.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set a maximum wait per command. Without one, a stuck remote
    /// deployment is polled indefinitely.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Run the full command sequence for `target`.
    ///
    /// RefreshCookbooks and Setup run only when the target's cookbook is in
    /// `stale_cookbooks`; app deployments always run, in declared order.
    #[instrument(skip(self, target, stale_cookbooks), fields(stack = %target.stack.name))]
    pub async fn run(
        &self,
        target: &DeployTarget,
        stale_cookbooks: &[CookbookDescriptor],
    ) -> Result<()> {
        let mut commands = Vec::new();
        if let Some(cookbook) = &target.cookbook {
            if stale_cookbooks.contains(cookbook) {
                commands.push(DeploymentCommand::RefreshCookbooks);
                commands.push(DeploymentCommand::Setup);
            }
        }
        commands.extend(target.apps.iter().cloned().map(DeploymentCommand::DeployApp));

        for command in &commands {
            self.dispatch(&target.stack, command).await?;
        }
        Ok(())
    }

    /// Issue one command and wait for its deployment to finish.
    async fn dispatch(&self, stack: &Stack, command: &DeploymentCommand) -> Result<()> {
        let deployment_id = self
            .fleet
            .create_deployment(&stack.id, command.app_id(), command.name())
            .await?
            .ok_or_else(|| FlotillaError::NoRunningInstances { stack_name: stack.name.clone() })?;
        self.reporter.command_started(&stack.name, command.name(), &deployment_id);

        let status = self.wait_for_terminal(stack, &deployment_id).await?;
        self.reporter.command_finished(&stack.name, command.name(), status);
        match status {
            DeploymentStatus::Successful => Ok(()),
            _ => Err(FlotillaError::CommandFailed {
                stack_name: stack.name.clone(),
                deployment_id,
                command: command.name().to_string(),
            }),
        }
    }

    /// Poll until the deployment reaches a terminal status.
    ///
    /// A status lookup that matches no record is treated as Failed rather
    /// than polled forever.
    async fn wait_for_terminal(
        &self,
        stack: &Stack,
        deployment_id: &str,
    ) -> Result<DeploymentStatus> {
        let started = Instant::now();
        loop {
            let status = self
                .fleet
                .deployment_status(deployment_id)
                .await?
                .unwrap_or(DeploymentStatus::Failed);
            if status.is_terminal() {
                return Ok(status);
            }
            debug!(stack = %stack.name, deployment_id, %status, "Deployment still in progress");

            if let Some(deadline) = self.deadline {
                if started.elapsed() >= deadline {
                    return Err(FlotillaError::DeadlineExceeded {
                        stack_name: stack.name.clone(),
                        deployment_id: deployment_id.to_string(),
                    });
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
