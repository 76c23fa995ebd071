//! Export engine for dbpack.
//!
//! Encodes table rows into CSV, JSON and XLSX, renders a schema diagram
//! through an external tool, and packages the results into a flat ZIP
//! archive. Encoders are pure (columns + rows to bytes); file-system effects
//! live in [`atomic`], [`package`] and [`pipeline`].

pub mod atomic;
pub mod columns;
pub mod diagram;
pub mod encoder;
pub mod errors;
pub mod package;
pub mod pipeline;
pub mod report;

pub use columns::{cell_reference, column_index, column_name};
pub use diagram::{DiagramGenerator, DiagramOutcome, GraphvizRenderer, Renderer, describe};
pub use encoder::{FormatEncoder, encode_table, encoder_for};
pub use errors::{EncodeError, PackageError};
pub use package::{PackageItem, PackageSummary, Packager};
pub use pipeline::{DashboardOptions, DashboardRun, ExportOutcome, dashboard, export_table, visualize};
pub use report::{ArchiveReport, DiagramReport, JobReport, JobStatus, PipelineReport};
