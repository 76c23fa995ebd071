//! Catalog introspection and row extraction.

pub mod inspector;
pub mod options;
pub mod reader;
pub mod sqlite;

pub use inspector::SchemaInspector;
pub use options::IntrospectOptions;
pub use reader::RowCursor;
pub use sqlite::SqliteSource;

pub use dbpack_core::CatalogSnapshot;
