use dbpack_core::{CatalogSnapshot, ColumnDescriptor, TableDescriptor};

#[test]
fn serializes_snapshot_deterministically() {
    let snapshot = CatalogSnapshot {
        schema_version: "0.1".to_string(),
        engine: "sqlite".to_string(),
        database: Some("shop.db".to_string()),
        tables: vec![TableDescriptor {
            name: "users".to_string(),
            columns: vec![ColumnDescriptor::new("id", "INTEGER", false)],
        }],
    };

    let json = serde_json::to_string_pretty(&snapshot).expect("serialize snapshot");
    let expected = r#"{
  "schema_version": "0.1",
  "engine": "sqlite",
  "database": "shop.db",
  "tables": [
    {
      "name": "users",
      "columns": [
        {
          "name": "id",
          "type": "INTEGER",
          "nullable": false,
          "primary_key": false
        }
      ]
    }
  ]
}"#;
    assert_eq!(json, expected);
}
