//! Stack and app domain types.

use serde::{Deserialize, Serialize};

/// A named, independently deployable cluster managed by the fleet service.
///
/// Immutable snapshot fetched once per analysis; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stack {
    /// Stack ID
    pub id: String,

    /// Display name
    pub name: String,

    /// Declared cookbook source, if any
    #[serde(default)]
    pub cookbook_source: Option<CookbookSource>,
}

/// Where a stack's cookbook artifact lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookbookSource {
    /// Source type as declared by the fleet service (e.g. "s3", "git")
    #[serde(rename = "type")]
    pub kind: String,

    /// Artifact store location URL
    pub url: String,
}

/// An application belonging to exactly one stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct App {
    /// App ID
    pub id: String,

    /// Display name
    pub name: String,

    /// Owning stack ID
    pub stack_id: String,
}
