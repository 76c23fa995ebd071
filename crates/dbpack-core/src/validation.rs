use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::schema::CatalogSnapshot;

/// Validate internal consistency of a catalog snapshot.
///
/// This checks:
/// - table and column names are non-empty
/// - duplicate tables/columns
/// - every table has at least one column
pub fn validate_catalog(snapshot: &CatalogSnapshot) -> Result<()> {
    let mut tables = BTreeSet::new();

    for table in &snapshot.tables {
        if table.name.is_empty() {
            return Err(Error::InvalidSchema("table with empty name".to_string()));
        }
        if !tables.insert(table.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate table name: {}",
                table.name
            )));
        }
        if table.columns.is_empty() {
            return Err(Error::InvalidSchema(format!(
                "table has no columns: {}",
                table.name
            )));
        }

        let mut columns = BTreeSet::new();
        for column in &table.columns {
            if column.name.is_empty() {
                return Err(Error::InvalidSchema(format!(
                    "column with empty name in table {}",
                    table.name
                )));
            }
            if !columns.insert(column.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate column name: {}.{}",
                    table.name, column.name
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDescriptor, TableDescriptor};

    fn snapshot(tables: Vec<TableDescriptor>) -> CatalogSnapshot {
        CatalogSnapshot {
            schema_version: crate::SCHEMA_VERSION.to_string(),
            engine: "sqlite".to_string(),
            database: None,
            tables,
        }
    }

    #[test]
    fn accepts_well_formed_catalog() {
        let users = TableDescriptor {
            name: "users".to_string(),
            columns: vec![
                ColumnDescriptor::new("id", "INTEGER", false),
                ColumnDescriptor::new("name", "TEXT", true),
            ],
        };
        assert!(validate_catalog(&snapshot(vec![users])).is_ok());
    }

    #[test]
    fn rejects_duplicate_columns() {
        let users = TableDescriptor {
            name: "users".to_string(),
            columns: vec![
                ColumnDescriptor::new("id", "INTEGER", false),
                ColumnDescriptor::new("id", "TEXT", true),
            ],
        };
        let err = validate_catalog(&snapshot(vec![users])).unwrap_err();
        assert!(err.to_string().contains("users.id"));
    }
}
