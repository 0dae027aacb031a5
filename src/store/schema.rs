//! Schema Reconciler: diff incoming sheet columns against the destination
//! table and keep the usable intersection.

use super::{ID_COLUMN, PERIOD_COLUMN};

/// Result of reconciling sheet columns with a table's declared columns.
///
/// Mismatches are diagnostics only; ingestion always proceeds on `usable`.
/// Partial schema drift must not block daily reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDiff {
    /// Incoming columns that exist in the table, in sheet order, excluding
    /// the surrogate key and blank/placeholder names.
    pub usable: Vec<String>,
    /// Incoming columns the table does not have.
    pub missing_in_table: Vec<String>,
    /// Table columns the sheet does not provide (surrogate key and period
    /// column excluded, they are never expected from a sheet).
    pub missing_in_incoming: Vec<String>,
}

pub fn reconcile(incoming: &[String], table_columns: &[String]) -> SchemaDiff {
    let usable: Vec<String> = incoming
        .iter()
        .filter(|name| {
            let lowered = name.to_lowercase();
            !name.is_empty()
                && lowered != "nan"
                && name.as_str() != ID_COLUMN
                && table_columns.contains(name)
        })
        .cloned()
        .collect();

    let missing_in_table: Vec<String> = incoming
        .iter()
        .filter(|name| !name.is_empty() && !table_columns.contains(name))
        .cloned()
        .collect();

    let missing_in_incoming: Vec<String> = table_columns
        .iter()
        .filter(|name| {
            name.as_str() != ID_COLUMN
                && name.as_str() != PERIOD_COLUMN
                && !incoming.contains(name)
        })
        .cloned()
        .collect();

    SchemaDiff {
        usable,
        missing_in_table,
        missing_in_incoming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_usable_is_ordered_intersection() {
        let incoming = cols(&["产品名称", "数量", "未知列", "金额"]);
        let table = cols(&["id", "金额", "产品名称", "数量", "当期日期"]);
        let diff = reconcile(&incoming, &table);
        assert_eq!(diff.usable, cols(&["产品名称", "数量", "金额"]));
        assert_eq!(diff.missing_in_table, cols(&["未知列"]));
        assert!(diff.missing_in_incoming.is_empty());
    }

    #[test]
    fn test_surrogate_and_period_columns_excluded() {
        let incoming = cols(&["id", "数量"]);
        let table = cols(&["id", "数量", "备注", "当期日期"]);
        let diff = reconcile(&incoming, &table);
        assert_eq!(diff.usable, cols(&["数量"]));
        assert_eq!(diff.missing_in_incoming, cols(&["备注"]));
    }

    #[test]
    fn test_placeholder_names_never_usable() {
        let incoming = cols(&["nan", "", "col_2", "数量"]);
        let table = cols(&["数量", "col_2"]);
        let diff = reconcile(&incoming, &table);
        assert_eq!(diff.usable, cols(&["col_2", "数量"]));
    }

    #[test]
    fn test_mismatches_never_abort() {
        // Completely disjoint columns still reconcile to an empty usable
        // set; the caller decides what zero usable columns means.
        let diff = reconcile(&cols(&["甲", "乙"]), &cols(&["丙"]));
        assert!(diff.usable.is_empty());
        assert_eq!(diff.missing_in_table.len(), 2);
        assert_eq!(diff.missing_in_incoming.len(), 1);
    }
}
