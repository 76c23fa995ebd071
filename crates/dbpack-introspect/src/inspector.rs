use async_trait::async_trait;

use dbpack_core::{CatalogSnapshot, ColumnDescriptor, Result, SCHEMA_VERSION, TableDescriptor};

/// Trait implemented by data sources that can describe their catalog.
#[async_trait]
pub trait SchemaInspector: Send {
    /// Returns the engine identifier (e.g. `sqlite`).
    fn engine(&self) -> &'static str;

    /// Database name or file, when the source knows it.
    fn database(&self) -> Option<String> {
        None
    }

    /// Table names in catalog-reported order.
    async fn list_tables(&mut self) -> Result<Vec<String>>;

    /// Columns of `table` in authoritative order.
    ///
    /// Fails with [`dbpack_core::Error::TableNotFound`] when `table` is not
    /// returned by [`SchemaInspector::list_tables`].
    async fn describe_table(&mut self, table: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Describe every listed table.
    async fn describe_all(&mut self) -> Result<Vec<TableDescriptor>> {
        let mut tables = Vec::new();
        for name in self.list_tables().await? {
            let columns = self.describe_table(&name).await?;
            tables.push(TableDescriptor { name, columns });
        }
        Ok(tables)
    }

    /// Capture a serializable snapshot of the catalog.
    async fn snapshot(&mut self) -> Result<CatalogSnapshot> {
        let tables = self.describe_all().await?;
        Ok(CatalogSnapshot {
            schema_version: SCHEMA_VERSION.to_string(),
            engine: self.engine().to_string(),
            database: self.database(),
            tables,
        })
    }
}
