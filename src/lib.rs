//! semantic-protocol - semantic field classification and manifest discovery
//!
//! Two halves share one crate: a rule-based [`classifier`] that infers what a
//! data field means and how to render it, and an in-memory manifest
//! [`registry`] with [`discovery`] queries and [`relationships`] analysis.
//! [`engine::Engine`] puts the registry behind a read-write lock for
//! concurrent use.

pub mod classifier;
pub mod commands;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod models;
pub mod registry;
pub mod relationships;
pub mod validation;

pub use classifier::{analyze, Classifier};
pub use discovery::{DiscoveryEngine, Query};
pub use engine::Engine;
pub use error::{DiscoveryError, QueryError, RegistryError};
pub use models::{
    AnalysisResult, FieldDefinition, FieldType, Manifest, RenderContext, RenderInstruction,
    SemanticMatch,
};
pub use registry::{Registration, Registry};
pub use relationships::{RelationshipGraph, RelationshipIssue};
