use serde::Serialize;
use serde::ser::SerializeMap;
use serde_json::ser::PrettyFormatter;

use dbpack_core::{CellValue, ColumnDescriptor, ExportFormat, Row};

use super::{FormatEncoder, StreamState};
use crate::errors::EncodeError;

const INDENT: &[u8] = b"  ";

/// JSON array with one object per row, keys in column order.
///
/// Output matches `serde_json::to_string_pretty` of the whole array plus a
/// trailing newline, but rows are serialized as they arrive.
pub struct JsonEncoder {
    state: StreamState,
    out: Vec<u8>,
    rows: u64,
}

impl JsonEncoder {
    pub fn new() -> Self {
        Self {
            state: StreamState::default(),
            out: Vec::new(),
            rows: 0,
        }
    }
}

impl Default for JsonEncoder {
    fn default() -> Self {
        Self::new()
    }
}

struct RowObject<'a> {
    columns: &'a [ColumnDescriptor],
    row: &'a Row,
}

impl Serialize for RowObject<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, cell) in self.columns.iter().zip(self.row.cells()) {
            map.serialize_entry(&column.name, cell)?;
        }
        map.end()
    }
}

impl FormatEncoder for JsonEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Document
    }

    fn begin_stream(&mut self, columns: &[ColumnDescriptor]) -> Result<(), EncodeError> {
        self.state.begin(columns)
    }

    fn write_row(&mut self, row: &Row) -> Result<(), EncodeError> {
        let columns = self.state.check(row)?;

        for (column, cell) in columns.iter().zip(row.cells()) {
            if let CellValue::Float(value) = cell {
                if !value.is_finite() {
                    return Err(EncodeError::NonFinite {
                        column: column.name.clone(),
                        value: *value,
                    });
                }
            }
        }

        let mut object = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut object, PrettyFormatter::with_indent(INDENT));
        RowObject { columns, row }.serialize(&mut serializer)?;

        self.out
            .extend_from_slice(if self.rows == 0 { b"[\n" } else { b",\n" });
        for (index, line) in object.split(|byte| *byte == b'\n').enumerate() {
            if index > 0 {
                self.out.push(b'\n');
            }
            self.out.extend_from_slice(INDENT);
            self.out.extend_from_slice(line);
        }
        self.rows += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, EncodeError> {
        let Self { state, mut out, rows } = *self;
        state.columns()?;
        if rows == 0 {
            out.extend_from_slice(b"[]");
        } else {
            out.extend_from_slice(b"\n]");
        }
        out.push(b'\n');
        Ok(out)
    }
}
