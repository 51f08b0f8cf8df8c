use std::collections::BTreeSet;

use super::table::TableName;

/// Adds every table whose identity map a requested table needs.
pub fn expand(requested: &BTreeSet<TableName>) -> BTreeSet<TableName> {
    let mut seen = BTreeSet::new();
    for table in requested {
        visit(*table, &mut seen);
    }
    seen
}

fn visit(table: TableName, seen: &mut BTreeSet<TableName>) {
    if !seen.insert(table) {
        return;
    }
    for dep in table.dependencies() {
        visit(*dep, seen);
    }
}

/// Canonical processing order restricted to the expanded set.
pub fn processing_order(requested: &BTreeSet<TableName>) -> Vec<TableName> {
    let mut order: Vec<TableName> = expand(requested).into_iter().collect();
    order.sort_by_key(|t| t.rank());
    order
}
