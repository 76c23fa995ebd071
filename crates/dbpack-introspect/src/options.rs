/// Options that control which catalog objects are visible.
#[derive(Debug, Clone)]
pub struct IntrospectOptions {
    /// Include SQLite internal tables such as `sqlite_sequence`.
    pub include_system_tables: bool,
    pub include_views: bool,
    /// Tables hidden from listing, description and export.
    pub ignore_tables: Vec<String>,
}

impl Default for IntrospectOptions {
    fn default() -> Self {
        Self {
            include_system_tables: false,
            include_views: false,
            ignore_tables: Vec::new(),
        }
    }
}
