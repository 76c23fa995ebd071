use dbpack_core::ColumnDescriptor;

use crate::options::IntrospectOptions;

use super::queries::{RawColumn, RawTable};

pub fn filter_tables(raw: Vec<RawTable>, opts: &IntrospectOptions) -> Vec<String> {
    raw.into_iter()
        .filter(|table| is_visible(table, opts))
        .map(|table| table.name)
        .collect()
}

pub fn is_visible(table: &RawTable, opts: &IntrospectOptions) -> bool {
    let is_system = table.name.starts_with("sqlite_");
    let kind_enabled = match table.kind.as_str() {
        "table" => true,
        "view" => opts.include_views,
        _ => false,
    };
    kind_enabled
        && (opts.include_system_tables || !is_system)
        && !opts.ignore_tables.iter().any(|item| item == &table.name)
}

pub fn map_columns(raw: Vec<RawColumn>) -> Vec<ColumnDescriptor> {
    raw.into_iter()
        .map(|col| ColumnDescriptor {
            name: col.name,
            data_type: col.data_type,
            nullable: !col.not_null,
            primary_key: col.primary_key,
        })
        .collect()
}
