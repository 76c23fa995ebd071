use async_trait::async_trait;
use sqlx::{Connection, SqliteConnection};

use dbpack_core::{ColumnDescriptor, ColumnStats, Error, Result, TableStats};

use crate::inspector::SchemaInspector;
use crate::options::IntrospectOptions;
use crate::reader::RowCursor;

mod mapper;
mod queries;

/// SQLite data source backed by a single connection.
///
/// Catalog queries and row cursors share the connection; no pooling.
pub struct SqliteSource {
    conn: SqliteConnection,
    opts: IntrospectOptions,
    database: Option<String>,
    cursor_sql: String,
}

impl SqliteSource {
    /// Connect to `url` (e.g. `sqlite://shop.db` or `sqlite::memory:`).
    pub async fn connect(url: &str, opts: IntrospectOptions) -> Result<Self> {
        let conn = SqliteConnection::connect(url)
            .await
            .map_err(|err| Error::Connection(format!("{url}: {err}")))?;
        let database = dbpack_core::redact_connection_string(url).database;
        tracing::info!(event = "source_connected", engine = "sqlite");
        Ok(Self {
            conn,
            opts,
            database,
            cursor_sql: String::new(),
        })
    }

    /// Wrap an already-open connection.
    pub fn from_connection(conn: SqliteConnection, opts: IntrospectOptions) -> Self {
        Self {
            conn,
            opts,
            database: None,
            cursor_sql: String::new(),
        }
    }

    pub fn options(&self) -> &IntrospectOptions {
        &self.opts
    }

    /// Open a cursor over every row of `table`.
    ///
    /// Each row's cells follow [`SchemaInspector::describe_table`] order.
    pub async fn open_cursor(&mut self, table: &str) -> Result<RowCursor<'_>> {
        let columns = self.describe_table(table).await?;
        self.cursor_sql = queries::select_columns(table, &columns);

        let Self {
            conn, cursor_sql, ..
        } = self;
        let stream = sqlx::query(cursor_sql.as_str()).fetch(conn);
        Ok(RowCursor::new(table.to_string(), columns, stream))
    }

    /// Row count and per-column null counts for `table`.
    pub async fn table_stats(&mut self, table: &str) -> Result<TableStats> {
        let columns = self.describe_table(table).await?;
        let rows = queries::count_rows(&mut self.conn, table).await?;

        let mut stats = Vec::with_capacity(columns.len());
        for column in columns {
            let nulls = queries::count_nulls(&mut self.conn, table, &column.name).await?;
            stats.push(ColumnStats {
                name: column.name,
                data_type: column.data_type,
                nulls,
            });
        }

        Ok(TableStats {
            table: table.to_string(),
            rows,
            columns: stats,
        })
    }

    /// Close the connection gracefully.
    pub async fn close(self) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|err| Error::Connection(err.to_string()))
    }
}

#[async_trait]
impl SchemaInspector for SqliteSource {
    fn engine(&self) -> &'static str {
        "sqlite"
    }

    fn database(&self) -> Option<String> {
        self.database.clone()
    }

    async fn list_tables(&mut self) -> Result<Vec<String>> {
        let raw = queries::list_tables(&mut self.conn).await?;
        Ok(mapper::filter_tables(raw, &self.opts))
    }

    async fn describe_table(&mut self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let visible = queries::find_table(&mut self.conn, table)
            .await?
            .is_some_and(|raw| mapper::is_visible(&raw, &self.opts));
        if !visible {
            return Err(Error::TableNotFound(table.to_string()));
        }

        let raw = queries::list_columns(&mut self.conn, table).await?;
        Ok(mapper::map_columns(raw))
    }
}
