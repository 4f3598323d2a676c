//! Flotilla Core Library
//!
//! Deployment orchestration for fleet-managed stacks: staleness analysis of
//! cookbook artifacts, cookbook packaging and publishing, and concurrent
//! per-stack command dispatch with failure aggregation.

pub mod analyzer;
pub mod builder;
pub mod clients;
pub mod dispatcher;
pub mod error;
pub mod metadata;
pub mod orchestrator;
pub mod publisher;
pub mod report;
pub mod types;

// Re-export commonly used items
pub use analyzer::StackAnalyzer;
pub use builder::CookbookBuilder;
pub use clients::{
    FingerprintSource, FleetClient, GitFingerprint, HttpFleetClient, HttpObjectStore, ObjectStore,
};
pub use dispatcher::{DeploymentDispatcher, DEFAULT_POLL_INTERVAL};
pub use error::{FlotillaError, Result};
pub use orchestrator::{DeployReport, Deployer, FleetDeployer, Orchestrator};
pub use publisher::ArtifactPublisher;
pub use report::{LogReporter, NullReporter, ProgressReporter};
pub use types::{
    AnalysisResult, App, CookbookDescriptor, CookbookSource, DeployTarget, DeploymentCommand,
    DeploymentStatus, Stack, StoreLocation,
};
