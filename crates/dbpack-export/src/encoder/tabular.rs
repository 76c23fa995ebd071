use dbpack_core::{ColumnDescriptor, ExportFormat, Row};

use super::{FormatEncoder, StreamState};
use crate::errors::EncodeError;

/// Comma-delimited text with a header line.
///
/// Quoting follows the `csv` crate's necessary-only style: fields holding the
/// delimiter, a quote or a line break are quoted.
pub struct CsvEncoder {
    state: StreamState,
    writer: csv::Writer<Vec<u8>>,
}

impl CsvEncoder {
    pub fn new() -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        Self {
            state: StreamState::default(),
            writer,
        }
    }
}

impl Default for CsvEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatEncoder for CsvEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Tabular
    }

    fn begin_stream(&mut self, columns: &[ColumnDescriptor]) -> Result<(), EncodeError> {
        self.state.begin(columns)?;
        self.writer
            .write_record(columns.iter().map(|col| col.name.as_str()))?;
        Ok(())
    }

    fn write_row(&mut self, row: &Row) -> Result<(), EncodeError> {
        self.state.check(row)?;
        let record: Vec<String> = row.cells().iter().map(|cell| cell.to_text()).collect();
        self.writer.write_record(&record)?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, EncodeError> {
        let Self { state, mut writer } = *self;
        state.columns()?;
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|err| EncodeError::Io(err.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode_table;
    use crate::encoder::fixtures::{users_columns, users_rows};
    use dbpack_core::CellValue;

    fn encode(columns: &[ColumnDescriptor], rows: &[Row]) -> String {
        let bytes = encode_table(ExportFormat::Tabular, columns, rows).expect("encode csv");
        String::from_utf8(bytes).expect("utf8 csv")
    }

    #[test]
    fn header_then_one_line_per_row() {
        let text = encode(&users_columns(), &users_rows(5));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines.iter().all(|line| !line.is_empty()));
        assert_eq!(lines[0], "id,name,email");
        assert_eq!(lines[1], "1,User1,user1@example.com");
        assert_eq!(lines[2], "2,User2,");
    }

    #[test]
    fn zero_rows_yields_only_the_header() {
        let text = encode(&users_columns(), &[]);
        assert_eq!(text, "id,name,email\n");
    }

    #[test]
    fn quotes_delimiters_and_line_breaks() {
        let columns = vec![
            ColumnDescriptor::new("note", "TEXT", true),
            ColumnDescriptor::new("flag", "BOOLEAN", true),
            ColumnDescriptor::new("ratio", "REAL", true),
        ];
        let rows = vec![Row::new(vec![
            CellValue::from("a,b \"c\"\nd"),
            CellValue::Boolean(false),
            CellValue::Float(0.25),
        ])];
        let text = encode(&columns, &rows);
        assert_eq!(text, "note,flag,ratio\n\"a,b \"\"c\"\"\nd\",false,0.25\n");
    }

    #[test]
    fn single_null_column_still_produces_a_line() {
        let columns = vec![ColumnDescriptor::new("email", "TEXT", true)];
        let rows = vec![Row::new(vec![CellValue::Null])];
        let text = encode(&columns, &rows);
        assert_eq!(text.lines().filter(|line| !line.is_empty()).count(), 2);
    }
}
