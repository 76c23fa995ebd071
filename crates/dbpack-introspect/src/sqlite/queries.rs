use sqlx::SqliteConnection;

use dbpack_core::{ColumnDescriptor, Error, Result};

pub struct RawTable {
    pub name: String,
    pub kind: String,
}

pub async fn list_tables(conn: &mut SqliteConnection) -> Result<Vec<RawTable>> {
    let rows = sqlx::query_as::<_, (String, String)>(
        r#"
        select name, type
        from sqlite_master
        where type in ('table', 'view')
        "#,
    )
    .fetch_all(conn)
    .await
    .map_err(db_error)?;

    Ok(rows
        .into_iter()
        .map(|(name, kind)| RawTable { name, kind })
        .collect())
}

pub async fn find_table(conn: &mut SqliteConnection, name: &str) -> Result<Option<RawTable>> {
    let row = sqlx::query_as::<_, (String, String)>(
        r#"
        select name, type
        from sqlite_master
        where type in ('table', 'view') and name = ?1
        "#,
    )
    .bind(name)
    .fetch_optional(conn)
    .await
    .map_err(db_error)?;

    Ok(row.map(|(name, kind)| RawTable { name, kind }))
}

pub struct RawColumn {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

pub async fn list_columns(conn: &mut SqliteConnection, table: &str) -> Result<Vec<RawColumn>> {
    let rows = sqlx::query_as::<_, (String, String, i64, i64)>(
        r#"
        select name, type, "notnull", pk
        from pragma_table_info(?1)
        order by cid
        "#,
    )
    .bind(table)
    .fetch_all(conn)
    .await
    .map_err(db_error)?;

    Ok(rows
        .into_iter()
        .map(|(name, data_type, not_null, pk)| RawColumn {
            name,
            data_type,
            not_null: not_null != 0,
            primary_key: pk > 0,
        })
        .collect())
}

pub async fn count_rows(conn: &mut SqliteConnection, table: &str) -> Result<u64> {
    let sql = format!("select count(*) from {}", quote_ident(table));
    let count = sqlx::query_scalar::<_, i64>(&sql)
        .fetch_one(conn)
        .await
        .map_err(db_error)?;
    Ok(count.max(0) as u64)
}

pub async fn count_nulls(conn: &mut SqliteConnection, table: &str, column: &str) -> Result<u64> {
    let sql = format!(
        "select count(*) from {} where {} is null",
        quote_ident(table),
        quote_ident(column)
    );
    let count = sqlx::query_scalar::<_, i64>(&sql)
        .fetch_one(conn)
        .await
        .map_err(db_error)?;
    Ok(count.max(0) as u64)
}

/// Build a select whose result columns follow `columns` exactly.
pub fn select_columns(table: &str, columns: &[ColumnDescriptor]) -> String {
    let list = columns
        .iter()
        .map(|col| quote_ident(&col.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!("select {list} from {}", quote_ident(table))
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Map driver failures onto the core taxonomy.
///
/// I/O, TLS, pool and protocol failures mean the source itself is unreachable;
/// anything else is a catalog the driver could not make sense of.
pub fn db_error(err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => Error::Connection(err.to_string()),
        other => Error::InvalidSchema(format!("catalog query failed: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_identifiers_with_embedded_quotes() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn select_follows_column_order() {
        let columns = vec![
            ColumnDescriptor::new("email", "TEXT", true),
            ColumnDescriptor::new("id", "INTEGER", false),
        ];
        assert_eq!(
            select_columns("users", &columns),
            "select \"email\", \"id\" from \"users\""
        );
    }
}
