use std::path::PathBuf;

use thiserror::Error;

/// Errors emitted by format encoders.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("write_row called before begin_stream")]
    NotStarted,
    #[error("begin_stream called twice")]
    AlreadyStarted,
    #[error("row has {found} cells but {expected} columns were declared")]
    RowWidth { expected: usize, found: usize },
    #[error("column '{column}' holds {value}, which the format cannot represent")]
    NonFinite { column: String, value: f64 },
    #[error("column '{column}' holds a control character the format cannot represent")]
    InvalidCharacter { column: String },
    #[error("sheet limit exceeded: {0}")]
    SheetLimit(String),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors emitted while assembling an archive.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("declared artifact is missing: {}", .0.display())]
    Missing(PathBuf),
    #[error("duplicate archive entry: {0}")]
    Duplicate(String),
    #[error("invalid archive entry name: '{0}'")]
    InvalidName(String),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PackageError> for dbpack_core::Error {
    fn from(err: PackageError) -> Self {
        dbpack_core::Error::Packaging(err.to_string())
    }
}
