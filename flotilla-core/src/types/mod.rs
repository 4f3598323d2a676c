//! Domain types shared across the orchestration pipeline.

pub mod cookbook;
pub mod deploy;
pub mod stack;

pub use cookbook::{CookbookDescriptor, StoreLocation};
pub use deploy::{AnalysisResult, DeployTarget, DeploymentCommand, DeploymentStatus};
pub use stack::{App, CookbookSource, Stack};
