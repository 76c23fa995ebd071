use std::borrow::Cow;
use std::io::{Cursor, Write};

use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use dbpack_core::{CellValue, ColumnDescriptor, ExportFormat, Row};

use super::{FormatEncoder, StreamState};
use crate::columns::cell_reference;
use crate::errors::EncodeError;

pub const SHEET_NAME: &str = "Sheet1";
pub const SHEET_PATH: &str = "xl/worksheets/sheet1.xml";

const MAX_COLUMNS: usize = 16_384;
const MAX_ROWS: u32 = 1_048_576;
/// Integers beyond this magnitude lose precision as spreadsheet numbers.
const MAX_SAFE_INTEGER: i64 = 1 << 53;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

/// Single-sheet XLSX workbook: header in row 1, one row per record after it.
///
/// Cells are addressed with unbounded base-26 column letters, so tables wider
/// than 26 columns get `AA1`, `AB1`, ... rather than colliding identifiers.
pub struct XlsxEncoder {
    state: StreamState,
    sheet: String,
    next_row: u32,
}

impl XlsxEncoder {
    pub fn new() -> Self {
        Self {
            state: StreamState::default(),
            sheet: String::new(),
            next_row: 0,
        }
    }
}

impl Default for XlsxEncoder {
    fn default() -> Self {
        Self::new()
    }
}

enum SheetCell<'a> {
    Empty,
    Number(String),
    Boolean(bool),
    Text(Cow<'a, str>),
}

fn sheet_cell<'a>(
    column: &ColumnDescriptor,
    value: &'a CellValue,
) -> Result<SheetCell<'a>, EncodeError> {
    Ok(match value {
        CellValue::Null => SheetCell::Empty,
        CellValue::Integer(v) if (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(v) => {
            SheetCell::Number(v.to_string())
        }
        CellValue::Integer(v) => SheetCell::Text(Cow::Owned(v.to_string())),
        CellValue::Float(v) if v.is_finite() => SheetCell::Number(v.to_string()),
        CellValue::Float(v) => {
            return Err(EncodeError::NonFinite {
                column: column.name.clone(),
                value: *v,
            });
        }
        CellValue::Boolean(v) => SheetCell::Boolean(*v),
        CellValue::Text(v) => SheetCell::Text(Cow::Borrowed(v)),
    })
}

/// Append one `<row>` element for zero-based `row`.
fn append_row<'a, I>(sheet: &mut String, row: u32, cells: I) -> Result<(), EncodeError>
where
    I: IntoIterator<Item = (&'a ColumnDescriptor, SheetCell<'a>)>,
{
    if row >= MAX_ROWS {
        return Err(EncodeError::SheetLimit(format!("more than {MAX_ROWS} rows")));
    }

    let mut xml = format!("<row r=\"{}\">", u64::from(row) + 1);
    for (col, (column, cell)) in (0u32..).zip(cells) {
        let reference = cell_reference(row, col);
        match cell {
            SheetCell::Empty => {}
            SheetCell::Number(value) => {
                xml.push_str(&format!("<c r=\"{reference}\"><v>{value}</v></c>"));
            }
            SheetCell::Boolean(value) => {
                let flag = u8::from(value);
                xml.push_str(&format!("<c r=\"{reference}\" t=\"b\"><v>{flag}</v></c>"));
            }
            SheetCell::Text(text) => {
                let escaped = escape_xml(&text).ok_or_else(|| EncodeError::InvalidCharacter {
                    column: column.name.clone(),
                })?;
                let space = if text.trim() != text.as_ref() {
                    " xml:space=\"preserve\""
                } else {
                    ""
                };
                xml.push_str(&format!(
                    "<c r=\"{reference}\" t=\"inlineStr\"><is><t{space}>{escaped}</t></is></c>"
                ));
            }
        }
    }
    xml.push_str("</row>");
    sheet.push_str(&xml);
    Ok(())
}

impl FormatEncoder for XlsxEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Spreadsheet
    }

    fn begin_stream(&mut self, columns: &[ColumnDescriptor]) -> Result<(), EncodeError> {
        if columns.len() > MAX_COLUMNS {
            return Err(EncodeError::SheetLimit(format!(
                "{} columns, at most {MAX_COLUMNS} allowed",
                columns.len()
            )));
        }
        self.state.begin(columns)?;
        let header = columns
            .iter()
            .map(|column| (column, SheetCell::Text(Cow::Borrowed(column.name.as_str()))));
        append_row(&mut self.sheet, self.next_row, header)?;
        self.next_row += 1;
        Ok(())
    }

    fn write_row(&mut self, row: &Row) -> Result<(), EncodeError> {
        let Self {
            state,
            sheet,
            next_row,
        } = self;
        let columns = state.check(row)?;
        let mut cells = Vec::with_capacity(columns.len());
        for (column, value) in columns.iter().zip(row.cells()) {
            cells.push((column, sheet_cell(column, value)?));
        }
        append_row(sheet, *next_row, cells)?;
        *next_row += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, EncodeError> {
        self.state.columns()?;

        let worksheet = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>{}</sheetData></worksheet>",
            self.sheet
        );
        let workbook = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\"><sheets><sheet name=\"{SHEET_NAME}\" sheetId=\"1\" r:id=\"rId1\"/></sheets></workbook>"
        );

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (path, body) in [
            ("[Content_Types].xml", CONTENT_TYPES),
            ("_rels/.rels", ROOT_RELS),
            ("xl/workbook.xml", workbook.as_str()),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            (SHEET_PATH, worksheet.as_str()),
        ] {
            zip.start_file(path, options)?;
            zip.write_all(body.as_bytes())?;
        }
        Ok(zip.finish()?.into_inner())
    }
}

/// Escape text for XML content, or `None` if it holds characters XML 1.0
/// cannot carry.
fn escape_xml(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' | '\n' | '\r' => out.push(ch),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => return None,
            c => out.push(c),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::columns::{column_index, column_name};
    use crate::encoder::encode_table;
    use crate::encoder::fixtures::{users_columns, users_rows};

    fn sheet_xml(bytes: Vec<u8>) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("open xlsx");
        let mut sheet = archive.by_name(SHEET_PATH).expect("sheet part");
        let mut xml = String::new();
        sheet.read_to_string(&mut xml).expect("read sheet");
        xml
    }

    fn cell_refs(xml: &str) -> Vec<String> {
        xml.split("<c r=\"")
            .skip(1)
            .filter_map(|chunk| chunk.split('"').next())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn header_row_holds_column_names() {
        let bytes = encode_table(ExportFormat::Spreadsheet, &users_columns(), &users_rows(5))
            .expect("encode xlsx");
        let xml = sheet_xml(bytes);
        assert!(xml.contains(r#"<c r="A1" t="inlineStr"><is><t>id</t></is></c>"#));
        assert!(xml.contains(r#"<c r="B1" t="inlineStr"><is><t>name</t></is></c>"#));
        assert!(xml.contains(r#"<c r="C1" t="inlineStr"><is><t>email</t></is></c>"#));
        assert!(xml.contains(r#"<c r="A2"><v>1</v></c>"#));
        assert_eq!(xml.matches("<row ").count(), 6);
    }

    #[test]
    fn null_cells_are_left_empty() {
        let bytes = encode_table(ExportFormat::Spreadsheet, &users_columns(), &users_rows(2))
            .expect("encode xlsx");
        let xml = sheet_xml(bytes);
        assert!(xml.contains("r=\"C2\""));
        assert!(!xml.contains("r=\"C3\""), "user 2 has no email");
    }

    #[test]
    fn wide_tables_get_unique_increasing_identifiers() {
        let columns: Vec<ColumnDescriptor> = (0..60)
            .map(|i| ColumnDescriptor::new(format!("c{i}"), "INTEGER", true))
            .collect();
        let row = Row::new((0..60).map(CellValue::Integer).collect());
        let bytes = encode_table(ExportFormat::Spreadsheet, &columns, [&row]).expect("encode xlsx");
        let xml = sheet_xml(bytes);

        let header: Vec<String> = cell_refs(&xml)
            .into_iter()
            .take(60)
            .map(|reference| reference.trim_end_matches('1').to_string())
            .collect();
        assert_eq!(header.len(), 60);
        assert_eq!(header[25], "Z");
        assert_eq!(header[26], "AA");
        assert_eq!(header[52], "BA");

        let indexes: Vec<u32> = header
            .iter()
            .map(|name| column_index(name).expect("valid column name"))
            .collect();
        assert!(indexes.windows(2).all(|pair| pair[0] < pair[1]));
        let expected: Vec<String> = (0..60).map(column_name).collect();
        assert_eq!(header, expected);
    }

    #[test]
    fn typed_cells() {
        let columns = vec![
            ColumnDescriptor::new("flag", "BOOLEAN", true),
            ColumnDescriptor::new("note", "TEXT", true),
            ColumnDescriptor::new("big", "INTEGER", true),
        ];
        let row = Row::new(vec![
            CellValue::Boolean(true),
            CellValue::from(" a<b & c "),
            CellValue::Integer(i64::MAX),
        ]);
        let xml = sheet_xml(
            encode_table(ExportFormat::Spreadsheet, &columns, [&row]).expect("encode xlsx"),
        );
        assert!(xml.contains(r#"<c r="A2" t="b"><v>1</v></c>"#));
        assert!(xml.contains(r#"<t xml:space="preserve"> a&lt;b &amp; c </t>"#));
        assert!(xml.contains(&format!(
            r#"<c r="C2" t="inlineStr"><is><t>{}</t></is></c>"#,
            i64::MAX
        )));
    }

    #[test]
    fn control_characters_are_rejected() {
        let columns = vec![ColumnDescriptor::new("note", "TEXT", true)];
        let row = Row::new(vec![CellValue::from("bell\u{7}")]);
        let err = encode_table(ExportFormat::Spreadsheet, &columns, [&row]).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidCharacter { .. }));
    }

    #[test]
    fn workbook_bytes_are_deterministic() {
        let first = encode_table(ExportFormat::Spreadsheet, &users_columns(), &users_rows(3))
            .expect("first");
        let second = encode_table(ExportFormat::Spreadsheet, &users_columns(), &users_rows(3))
            .expect("second");
        assert_eq!(first, second);
    }
}
