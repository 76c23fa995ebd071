use thiserror::Error;

/// Core error type shared across dbpack crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The data source could not be reached or the connection broke.
    #[error("connection error: {0}")]
    Connection(String),
    /// The requested table is not part of the catalog.
    #[error("table not found: {0}")]
    TableNotFound(String),
    /// A row could not be read or did not line up with the table columns.
    #[error("read error in table '{table}': {message}")]
    Read { table: String, message: String },
    /// A format encoder rejected a value or failed to produce output.
    #[error("encoding error in table '{table}' ({format}): {message}")]
    Encoding {
        table: String,
        format: String,
        message: String,
    },
    /// The external diagram renderer is missing, failed or timed out.
    #[error("external tool error: {0}")]
    ExternalTool(String),
    /// An archive could not be assembled or written.
    #[error("packaging error: {0}")]
    Packaging(String),
    /// The catalog violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for failures the pipeline may log and continue past.
    ///
    /// Only renderer failures degrade gracefully; everything else aborts the
    /// job or the pipeline that raised it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::ExternalTool(_))
    }

    pub fn read(table: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Read {
            table: table.into(),
            message: message.into(),
        }
    }
}

/// Convenience alias for results returned by dbpack crates.
pub type Result<T> = std::result::Result<T, Error>;
