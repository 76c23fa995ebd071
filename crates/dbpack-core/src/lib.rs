//! Core contracts and helpers for dbpack.
//!
//! This crate defines the catalog descriptors, the dynamically typed cell
//! values read from a data source, export jobs and artifacts, and the error
//! taxonomy shared by the introspection, export and CLI crates.

pub mod artifact;
pub mod error;
pub mod job;
pub mod redaction;
pub mod schema;
pub mod validation;
pub mod value;

pub use artifact::{Artifact, ArtifactOrigin};
pub use error::{Error, Result};
pub use job::{DiagramJob, ExportFormat, ExportJob, ParseFormatError};
pub use redaction::{RedactedConnection, redact_connection_string};
pub use schema::{CatalogSnapshot, ColumnDescriptor, ColumnStats, TableDescriptor, TableStats};
pub use validation::validate_catalog;
pub use value::{CellValue, Row};

/// Current contract version for `schema.json` artifacts.
pub const SCHEMA_VERSION: &str = "0.1";
