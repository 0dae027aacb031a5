//! Cell and column-name normalization.
//!
//! Column handling is decided once per report kind by building a
//! [`ColumnClassifier`] over the sheet's header, instead of re-matching
//! column-name substrings at every cell. Forced-identifier columns from the
//! report kind override the generic vocabulary heuristic.

use std::collections::HashMap;

use calamine::Data;

use super::ReportKind;

/// Monetary columns: stripped to a decimal, never null.
const MONETARY_MARKERS: [&str; 4] = ["供货价", "建议零售价", "销售金额", "结算金额"];

/// Count columns: stripped to an integer, null when absent.
const COUNT_MARKERS: [&str; 1] = ["数量"];

/// Identifier columns: codes and batch numbers, kept as opaque text so
/// leading zeros and mixed formats survive.
const IDENTIFIER_MARKERS: [&str; 2] = ["编码", "批次"];

/// Blank-cell placeholders that mean "no value".
const NULL_MARKERS: [&str; 2] = ["", "nan"];

/// A normalized cell ready for parameter binding.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    Integer(i64),
    Decimal(f64),
}

/// Coercion policy for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnClass {
    Identifier,
    Monetary,
    Count,
    Text,
}

/// Per-sheet column classification table, built once before coercion.
#[derive(Debug, Clone)]
pub struct ColumnClassifier {
    classes: HashMap<String, ColumnClass>,
}

impl ColumnClassifier {
    /// Classify `columns` for `kind`: forced-identifier columns first, then
    /// the vocabulary heuristic, then plain text.
    pub fn for_report(kind: ReportKind, columns: &[String]) -> Self {
        let forced = kind.forced_identifier_columns();
        let classes = columns
            .iter()
            .map(|name| {
                let class = if forced.contains(&name.as_str()) {
                    ColumnClass::Identifier
                } else {
                    classify_name(name)
                };
                (name.clone(), class)
            })
            .collect();
        Self { classes }
    }

    /// Columns not present in the table (e.g. positional fallbacks) coerce
    /// as plain text.
    pub fn class_of(&self, column: &str) -> ColumnClass {
        self.classes.get(column).copied().unwrap_or(ColumnClass::Text)
    }
}

/// Name-based vocabulary heuristic, used when no forced class applies.
fn classify_name(name: &str) -> ColumnClass {
    if MONETARY_MARKERS.iter().any(|m| name.contains(m)) {
        ColumnClass::Monetary
    } else if IDENTIFIER_MARKERS.iter().any(|m| name.contains(m)) {
        ColumnClass::Identifier
    } else if COUNT_MARKERS.iter().any(|m| name.contains(m)) {
        ColumnClass::Count
    } else {
        ColumnClass::Text
    }
}

/// Render a raw cell as trimmed text, or `None` for blank/placeholder cells.
///
/// Whole-number floats render without the trailing `.0` so code-like values
/// that Excel stored as numbers keep their digit string.
pub fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
    };
    if NULL_MARKERS.contains(&text.to_lowercase().as_str()) {
        None
    } else {
        Some(text)
    }
}

/// Coerce one raw value under the given column class.
///
/// Monetary columns always produce a number: blank input and unparseable
/// garbage both collapse to `0.0`, so amounts are never null downstream.
/// Every other class maps blank input to [`CellValue::Null`].
pub fn normalize_value(raw: Option<&str>, class: ColumnClass) -> CellValue {
    match class {
        ColumnClass::Monetary => {
            let cleaned: String = raw
                .unwrap_or("")
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            CellValue::Decimal(cleaned.parse::<f64>().unwrap_or(0.0))
        }
        ColumnClass::Count => {
            let Some(text) = raw else {
                return CellValue::Null;
            };
            let cleaned: String = text.chars().filter(char::is_ascii_digit).collect();
            match cleaned.parse::<i64>() {
                Ok(n) => CellValue::Integer(n),
                Err(_) => CellValue::Null,
            }
        }
        ColumnClass::Identifier | ColumnClass::Text => match raw {
            Some(text) => CellValue::Text(text.trim().to_string()),
            None => CellValue::Null,
        },
    }
}

/// Clean a raw header cell into a safe column name.
///
/// Blank or placeholder headers fall back to `col_<index>`; otherwise
/// spaces, hyphens, parentheses and slashes become underscores.
pub fn normalize_column_name(raw: Option<&str>, index: usize) -> String {
    let cleaned = raw.map(str::trim).unwrap_or("");
    if NULL_MARKERS.contains(&cleaned.to_lowercase().as_str()) {
        return format!("col_{}", index);
    }
    cleaned
        .chars()
        .map(|c| match c {
            ' ' | '-' | '(' | ')' | '/' => '_',
            other => other,
        })
        .collect()
}
