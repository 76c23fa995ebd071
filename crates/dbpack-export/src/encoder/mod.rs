//! Format encoders: column list + row stream in, bytes out.

mod document;
mod spreadsheet;
mod tabular;

pub use document::JsonEncoder;
pub use spreadsheet::XlsxEncoder;
pub use tabular::CsvEncoder;

use dbpack_core::{ColumnDescriptor, ExportFormat, Row};

use crate::errors::EncodeError;

/// Streaming encoder shared by every export format.
///
/// Callers invoke [`begin_stream`](FormatEncoder::begin_stream) once, then
/// [`write_row`](FormatEncoder::write_row) per row, then
/// [`finish`](FormatEncoder::finish). Encoders never touch the file system.
pub trait FormatEncoder: Send {
    fn format(&self) -> ExportFormat;

    fn begin_stream(&mut self, columns: &[ColumnDescriptor]) -> Result<(), EncodeError>;

    fn write_row(&mut self, row: &Row) -> Result<(), EncodeError>;

    fn finish(self: Box<Self>) -> Result<Vec<u8>, EncodeError>;
}

/// Construct the encoder for `format`.
pub fn encoder_for(format: ExportFormat) -> Box<dyn FormatEncoder> {
    match format {
        ExportFormat::Tabular => Box::new(CsvEncoder::new()),
        ExportFormat::Document => Box::new(JsonEncoder::new()),
        ExportFormat::Spreadsheet => Box::new(XlsxEncoder::new()),
    }
}

/// Encode an in-memory table in one call.
pub fn encode_table<'a, I>(
    format: ExportFormat,
    columns: &[ColumnDescriptor],
    rows: I,
) -> Result<Vec<u8>, EncodeError>
where
    I: IntoIterator<Item = &'a Row>,
{
    let mut encoder = encoder_for(format);
    encoder.begin_stream(columns)?;
    for row in rows {
        encoder.write_row(row)?;
    }
    encoder.finish()
}

/// Column bookkeeping common to all encoders.
#[derive(Debug, Default)]
pub(crate) struct StreamState {
    columns: Option<Vec<ColumnDescriptor>>,
}

impl StreamState {
    pub(crate) fn begin(&mut self, columns: &[ColumnDescriptor]) -> Result<(), EncodeError> {
        if self.columns.is_some() {
            return Err(EncodeError::AlreadyStarted);
        }
        self.columns = Some(columns.to_vec());
        Ok(())
    }

    /// Columns for a row about to be written; the row must match their count.
    pub(crate) fn check(&self, row: &Row) -> Result<&[ColumnDescriptor], EncodeError> {
        let columns = self.columns.as_deref().ok_or(EncodeError::NotStarted)?;
        if row.len() != columns.len() {
            return Err(EncodeError::RowWidth {
                expected: columns.len(),
                found: row.len(),
            });
        }
        Ok(columns)
    }

    pub(crate) fn columns(&self) -> Result<&[ColumnDescriptor], EncodeError> {
        self.columns.as_deref().ok_or(EncodeError::NotStarted)
    }
}
