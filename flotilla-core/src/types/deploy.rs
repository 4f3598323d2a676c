//! Deployment domain types: targets, commands, statuses.

use crate::types::cookbook::CookbookDescriptor;
use crate::types::stack::{App, Stack};
use serde::{Deserialize, Serialize};

/// A stack together with the apps to deploy on it and its cookbook descriptor.
///
/// Read-only once produced by analysis; dispatch tasks only borrow it.
#[derive(Debug, Clone)]
pub struct DeployTarget {
    /// The stack to deploy to
    pub stack: Stack,

    /// Apps to deploy, in declared order
    pub apps: Vec<App>,

    /// Cookbook descriptor, if the stack declares a recognized source
    pub cookbook: Option<CookbookDescriptor>,
}

/// Outcome of the analysis phase.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Unique stale descriptors, in first-seen order
    pub stale_cookbooks: Vec<CookbookDescriptor>,

    /// One target per analyzed stack, in input order
    pub targets: Vec<DeployTarget>,
}

/// A single command issued to a stack.
///
/// Within one stack, commands always run in the order
/// RefreshCookbooks -> Setup -> DeployApp per declared app.
#[derive(Debug, Clone)]
pub enum DeploymentCommand {
    /// Refresh the stack's custom cookbooks from the artifact store.
    RefreshCookbooks,
    /// Run the stack's setup recipes.
    Setup,
    /// Deploy one app.
    DeployApp(App),
}

impl DeploymentCommand {
    /// Wire name of the command as the fleet service expects it.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::RefreshCookbooks => "update_custom_cookbooks",
            Self::Setup => "setup",
            Self::DeployApp(_) => "deploy",
        }
    }

    /// App this command addresses, if any.
    #[must_use]
    pub fn app_id(&self) -> Option<&str> {
        match self {
            Self::DeployApp(app) => Some(&app.id),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeploymentCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeployApp(app) => write!(f, "deploy({})", app.name),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// Status of a remote deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    /// Deployment is queued.
    Pending,
    /// Deployment is executing.
    Running,
    /// Deployment finished successfully.
    Successful,
    /// Deployment finished with an error.
    Failed,
}

impl DeploymentStatus {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Successful => "successful",
            Self::Failed => "failed",
        }
    }

    /// Parse from string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "successful" => Some(Self::Successful),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether no further status transition can occur.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Successful | Self::Failed)
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
