//! Timestamped-table naming helpers shared by the store and collectors
//! (spec §3: `<tool>_YYYYMMDD_HHMMSS`, lexicographic order == chronological
//! order).

use chrono::{DateTime, Utc};

/// Render a collector table name for `tool` at `ts`.
pub fn table_name(tool: &str, ts: DateTime<Utc>) -> String {
    format!("{}_{}", tool, ts.format("%Y%m%d_%H%M%S"))
}

/// Render the schema-reference template table name for `tool`.
pub fn template_name(tool: &str) -> String {
    format!("{}_template", tool)
}

/// Whether `table` is a real (non-template) table belonging to `tool`.
pub fn is_tool_table(table: &str, tool: &str) -> bool {
    let prefix = format!("{}_", tool);
    table.starts_with(&prefix) && !table.ends_with("_template")
}
