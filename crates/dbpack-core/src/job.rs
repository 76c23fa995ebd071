use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Output format for a table export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Comma-delimited text with a header line.
    Tabular,
    /// Pretty-printed JSON array of objects.
    Document,
    /// Single-sheet XLSX workbook.
    Spreadsheet,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Tabular => "csv",
            ExportFormat::Document => "json",
            ExportFormat::Spreadsheet => "xlsx",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, Error)]
#[error("unknown export format '{0}' (expected csv, json or xlsx)")]
pub struct ParseFormatError(pub String);

impl FromStr for ExportFormat {
    type Err = ParseFormatError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" | "tabular" => Ok(ExportFormat::Tabular),
            "json" | "document" => Ok(ExportFormat::Document),
            "xlsx" | "excel" | "spreadsheet" => Ok(ExportFormat::Spreadsheet),
            _ => Err(ParseFormatError(value.to_string())),
        }
    }
}

/// A single table export request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportJob {
    pub table: String,
    pub format: ExportFormat,
    pub destination: PathBuf,
}

impl ExportJob {
    pub fn new(table: impl Into<String>, format: ExportFormat, destination: impl Into<PathBuf>) -> Self {
        Self {
            table: table.into(),
            format,
            destination: destination.into(),
        }
    }

    /// Job writing `<table>.<ext>` inside `dir`.
    pub fn in_dir(table: impl Into<String>, format: ExportFormat, dir: &Path) -> Self {
        let table = table.into();
        let destination = dir.join(format!("{table}.{}", format.extension()));
        Self {
            table,
            format,
            destination,
        }
    }

    /// Short identifier used in logs and reports.
    pub fn label(&self) -> String {
        format!("export:{}:{}", self.table, self.format)
    }
}

/// A schema diagram request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramJob {
    /// Where the graph description is written.
    pub description_path: PathBuf,
    /// Where the renderer should place the image.
    pub image_path: PathBuf,
    /// Renderer output format (e.g. `png`).
    pub image_format: String,
}

impl DiagramJob {
    pub fn in_dir(dir: &Path, stem: &str, image_format: &str) -> Self {
        Self {
            description_path: dir.join(format!("{stem}.dot")),
            image_path: dir.join(format!("{stem}.{image_format}")),
            image_format: image_format.to_string(),
        }
    }
}
