//! Cookbook metadata discovery and parsing.
//!
//! A directory is a cookbook definition iff it contains the `metadata.rb`
//! marker file. Only the `name` and `depends` declarations are read; the
//! rest of the file is recipe-engine territory and ignored here.

use crate::error::{FlotillaError, Result};
use std::path::{Path, PathBuf};

/// Marker file identifying a cookbook definition directory.
pub const METADATA_FILE: &str = "metadata.rb";

/// Declarations read from a cookbook's metadata file.
#[derive(Debug, Clone, Default)]
pub struct CookbookMetadata {
    /// Declared cookbook name
    pub name: Option<String>,

    /// Declared dependencies, in declaration order
    pub depends: Vec<String>,
}

/// Parse the metadata file of the cookbook at `dir`.
pub fn read_metadata(dir: &Path) -> Result<CookbookMetadata> {
    let path = dir.join(METADATA_FILE);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| FlotillaError::Io { path: path.clone(), source: e })?;
    Ok(parse_metadata(&content))
}

/// Parse metadata declarations from file content.
fn parse_metadata(content: &str) -> CookbookMetadata {
    let mut metadata = CookbookMetadata::default();
    for line in content.lines() {
        let line = line.trim();
        if let Some(value) = declaration_value(line, "name") {
            metadata.name = Some(value);
        } else if let Some(value) = declaration_value(line, "depends") {
            metadata.depends.push(value);
        }
    }
    metadata
}

/// Extract the first quoted argument of a `keyword 'value'` declaration.
fn declaration_value(line: &str, keyword: &str) -> Option<String> {
    let rest = line.strip_prefix(keyword)?;
    let rest = rest.strip_prefix(|c: char| c.is_whitespace() || c == '(')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let rest = &rest[1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

/// List cookbook definition directories directly under `root`.
///
/// Non-directories and directories without the marker file are skipped.
pub fn discover_cookbooks(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let entries = std::fs::read_dir(root)
        .map_err(|e| FlotillaError::Io { path: root.to_path_buf(), source: e })?;
    for entry in entries {
        let entry = entry.map_err(|e| FlotillaError::Io { path: root.to_path_buf(), source: e })?;
        let path = entry.path();
        if path.is_dir() && path.join(METADATA_FILE).is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}
