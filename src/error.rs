//! Error types for semantic-protocol
//!
//! Only fatal conditions live here. Validation failures, empty query results
//! and relationship issues are ordinary values returned by their modules.

use thiserror::Error;

/// Fatal registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// `register_value` was handed `null` instead of a manifest document
    #[error("register called without a manifest")]
    MissingManifest,

    #[error("circular inheritance detected: {}", .chain.join(" -> "))]
    CircularInheritance { chain: Vec<String> },

    #[error("Manifest not found: {0}")]
    NotFound(String),

    #[error("Failed to apply patch to {id}: {reason}")]
    Patch { id: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Discovery scan errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("discovery scan cancelled after {scanned} manifests")]
    Cancelled { scanned: usize },
}

/// Reasons a query document could not be turned into a query
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("query must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("query contains an empty key or path segment: {0:?}")]
    EmptyKey(String),

    #[error("invalid glob pattern {pattern:?}: {reason}")]
    InvalidGlob { pattern: String, reason: String },
}
