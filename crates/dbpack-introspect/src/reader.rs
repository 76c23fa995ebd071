use futures::TryStreamExt;
use futures::stream::BoxStream;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row as _, TypeInfo, ValueRef};

use dbpack_core::{CellValue, ColumnDescriptor, Error, Result, Row};

/// Forward-only, single-use sequence of rows for one table.
///
/// The cursor mutably borrows the source's connection, so a second cursor
/// (or any catalog query) cannot start until this one is gone. Dropping the
/// cursor releases the underlying statement on every exit path; call
/// [`RowCursor::close`] on the success path to log the release explicitly.
pub struct RowCursor<'c> {
    table: String,
    columns: Vec<ColumnDescriptor>,
    stream: BoxStream<'c, std::result::Result<SqliteRow, sqlx::Error>>,
    rows_read: u64,
    exhausted: bool,
}

impl<'c> RowCursor<'c> {
    pub(crate) fn new(
        table: String,
        columns: Vec<ColumnDescriptor>,
        stream: BoxStream<'c, std::result::Result<SqliteRow, sqlx::Error>>,
    ) -> Self {
        tracing::debug!(event = "cursor_opened", table = %table, columns = columns.len());
        Self {
            table,
            columns,
            stream,
            rows_read: 0,
            exhausted: false,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Columns every produced row is aligned with.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Fetch the next row, or `None` once the table is exhausted.
    ///
    /// A cursor never restarts: after `None` it keeps returning `None`.
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        if self.exhausted {
            return Ok(None);
        }

        let next = self
            .stream
            .try_next()
            .await
            .map_err(|err| Error::read(&self.table, err.to_string()))?;

        match next {
            Some(raw) => {
                let row = decode_row(&self.table, &self.columns, &raw)?;
                self.rows_read += 1;
                Ok(Some(row))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    /// Release the cursor and its statement.
    pub fn close(self) -> u64 {
        tracing::debug!(event = "cursor_closed", table = %self.table, rows = self.rows_read);
        self.rows_read
    }
}

/// Convert a driver row into cells aligned with `columns`.
///
/// A cell count that differs from the column count is a read error rather
/// than a truncated row.
pub(crate) fn decode_row(table: &str, columns: &[ColumnDescriptor], raw: &SqliteRow) -> Result<Row> {
    if raw.len() != columns.len() {
        return Err(Error::read(
            table,
            format!(
                "expected {} cells, found {}",
                columns.len(),
                raw.len()
            ),
        ));
    }

    let mut cells = Vec::with_capacity(columns.len());
    for (index, column) in columns.iter().enumerate() {
        cells.push(decode_cell(table, column, raw, index)?);
    }
    Ok(Row::new(cells))
}

fn decode_cell(
    table: &str,
    column: &ColumnDescriptor,
    raw: &SqliteRow,
    index: usize,
) -> Result<CellValue> {
    let value = raw
        .try_get_raw(index)
        .map_err(|err| Error::read(table, err.to_string()))?;
    if value.is_null() {
        return Ok(CellValue::Null);
    }

    let storage = value.type_info().name().to_string();
    let decoded = match storage.as_str() {
        "INTEGER" => raw.try_get_unchecked::<i64, _>(index).map(|v| {
            if column.is_boolean() {
                CellValue::Boolean(v != 0)
            } else {
                CellValue::Integer(v)
            }
        }),
        "REAL" => raw.try_get_unchecked::<f64, _>(index).map(CellValue::Float),
        "TEXT" => raw.try_get_unchecked::<String, _>(index).map(CellValue::Text),
        "BLOB" => raw
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(|bytes| CellValue::Text(hex::encode(bytes))),
        other => {
            return Err(Error::read(
                table,
                format!("column '{}' has unsupported storage class {other}", column.name),
            ));
        }
    };

    decoded.map_err(|err| Error::read(table, format!("column '{}': {err}", column.name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Connection, SqliteConnection};

    async fn fetch(sql: &str) -> SqliteRow {
        let mut conn = SqliteConnection::connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        sqlx::query(sql).fetch_one(&mut conn).await.expect("row")
    }

    fn users_columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id", "INTEGER", false),
            ColumnDescriptor::new("name", "TEXT", true),
        ]
    }

    #[tokio::test]
    async fn extra_cells_are_a_read_error() {
        let raw = fetch("select 1, 'a', 'surplus'").await;
        let err = decode_row("users", &users_columns(), &raw).unwrap_err();
        assert!(
            matches!(err, Error::Read { ref table, ref message } if table == "users" && message.contains("expected 2 cells, found 3")),
            "{err}"
        );
    }

    #[tokio::test]
    async fn missing_cells_are_a_read_error() {
        let raw = fetch("select 1").await;
        let err = decode_row("users", &users_columns(), &raw).unwrap_err();
        assert!(matches!(err, Error::Read { ref table, .. } if table == "users"));
    }

    #[tokio::test]
    async fn aligned_row_decodes_every_cell() {
        let raw = fetch("select 7, null").await;
        let row = decode_row("users", &users_columns(), &raw).expect("row");
        assert_eq!(row.cells(), &[CellValue::Integer(7), CellValue::Null]);
    }
}
