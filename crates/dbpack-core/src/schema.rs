use serde::{Deserialize, Serialize};

/// Column metadata as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Engine-reported type tag; SQLite allows this to be empty.
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            primary_key: false,
        }
    }

    /// True when the declared type marks the column as boolean-valued.
    pub fn is_boolean(&self) -> bool {
        self.data_type.to_ascii_uppercase().contains("BOOL")
    }
}

/// A table and its columns in authoritative order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|col| col.name.as_str()).collect()
    }
}

/// Point-in-time view of every table the inspector could see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// Contract version for this snapshot format.
    pub schema_version: String,
    /// Database engine identifier (e.g. `sqlite`).
    pub engine: String,
    /// Database file or name when available.
    pub database: Option<String>,
    pub tables: Vec<TableDescriptor>,
}

/// Row and null counts for a single table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableStats {
    pub table: String,
    pub rows: u64,
    pub columns: Vec<ColumnStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnStats {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nulls: u64,
}
