//! Sheet Reader: locate the header row and data extent inside a raw grid
//! and emit a normalized row set.

use std::path::Path;

use anyhow::{Context, Result};
use calamine::{Data, Reader, open_workbook_auto};

use super::columns::{self, CellValue, ColumnClassifier};
use super::ReportKind;

/// Normalized output of one sheet read: cleaned column names and coerced
/// rows, one `CellValue` per column.
#[derive(Debug, Clone)]
pub struct SheetData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetData {
    fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }
}

/// Load the first worksheet of a spreadsheet file as a raw grid. Handles
/// both accepted formats via format auto-detection.
pub fn read_grid(path: &Path) -> Result<Vec<Vec<Data>>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open spreadsheet: {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .with_context(|| format!("no worksheets in {}", path.display()))?
        .with_context(|| format!("failed to read first worksheet of {}", path.display()))?;
    Ok(range.rows().map(|r| r.to_vec()).collect())
}

/// Read a raw grid into a normalized row set using the layout of `kind`.
///
/// A grid too short for the layout (no header row, or no room for data)
/// yields an empty row set; zero ingested rows is a valid outcome for the
/// caller, not an error.
pub fn read_sheet(grid: &[Vec<Data>], kind: ReportKind) -> SheetData {
    let layout = kind.layout();

    let Some(header) = grid.get(layout.header_row) else {
        return SheetData::empty();
    };
    let column_names: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| columns::normalize_column_name(columns::cell_text(cell).as_deref(), i))
        .collect();

    let data_end = match layout.sentinel {
        Some(marker) => grid
            .iter()
            .enumerate()
            .skip(layout.data_start)
            .find(|(_, row)| row_contains_marker(row, marker))
            .map(|(i, _)| i)
            .unwrap_or(grid.len()),
        None => grid.len(),
    };

    let classifier = ColumnClassifier::for_report(kind, &column_names);
    let mut rows = Vec::new();
    for raw_row in grid
        .iter()
        .take(data_end)
        .skip(layout.data_start.min(data_end))
    {
        let texts: Vec<Option<String>> = (0..column_names.len())
            .map(|i| raw_row.get(i).and_then(columns::cell_text))
            .collect();
        // Fully blank rows carry no data; judged before coercion, since
        // monetary columns turn a blank cell into 0.0.
        if texts.iter().all(Option::is_none) {
            continue;
        }
        let row: Vec<CellValue> = column_names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                columns::normalize_value(texts[i].as_deref(), classifier.class_of(name))
            })
            .collect();
        rows.push(row);
    }

    SheetData {
        columns: column_names,
        rows,
    }
}

fn row_contains_marker(row: &[Data], marker: &str) -> bool {
    row.iter()
        .any(|cell| columns::cell_text(cell).is_some_and(|t| t.contains(marker)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::SENTINEL_MARKER;

    fn text_row(cells: &[&str]) -> Vec<Data> {
        cells.iter().map(|c| Data::String(c.to_string())).collect()
    }

    #[test]
    fn test_simple_layout_header_and_data() {
        let grid = vec![
            text_row(&["客户名称", "数量", "结算金额"]),
            text_row(&["客户甲", "3件", "120.50"]),
            text_row(&["客户乙", "", "垃圾"]),
            vec![Data::Empty, Data::Empty, Data::Empty],
        ];
        let sheet = read_sheet(&grid, ReportKind::CustomerRedemptionDetails);
        assert_eq!(sheet.columns, vec!["客户名称", "数量", "结算金额"]);
        // The trailing all-blank padding row is dropped.
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0][1], CellValue::Integer(3));
        assert_eq!(sheet.rows[0][2], CellValue::Decimal(120.50));
        // Count absent -> null, monetary garbage -> 0.0.
        assert_eq!(sheet.rows[1][1], CellValue::Null);
        assert_eq!(sheet.rows[1][2], CellValue::Decimal(0.0));
    }

    #[test]
    fn test_structured_layout_sentinel_ends_data() {
        let mut grid = vec![
            text_row(&["活动方案汇总表"]),
            text_row(&[]),
            text_row(&["活动名称", "数量", "供货价"]),
            text_row(&[]),
            text_row(&["促销A", "1", "10"]),
            text_row(&["促销B", "2", "20"]),
            text_row(&["促销C", "3", "30"]),
            text_row(&["进货单位：某某公司"]),
        ];
        grid.push(text_row(&["合计", "99", "999"]));
        let sheet = read_sheet(&grid, ReportKind::ActivityPlan);
        // Marker at row 7: exactly rows 4..6 survive, later content ignored.
        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.rows[2][0], CellValue::Text("促销C".to_string()));
    }

    #[test]
    fn test_structured_layout_without_sentinel_reads_to_end() {
        let grid = vec![
            text_row(&["标题"]),
            text_row(&[]),
            text_row(&["活动名称", "数量"]),
            text_row(&[]),
            text_row(&["促销A", "1"]),
            text_row(&["促销B", "2"]),
        ];
        let sheet = read_sheet(&grid, ReportKind::ActivityPlan);
        assert_eq!(sheet.rows.len(), 2);
    }

    #[test]
    fn test_short_grid_yields_empty_row_set() {
        let grid = vec![text_row(&["标题"]), text_row(&["小计"])];
        let sheet = read_sheet(&grid, ReportKind::ActivityPlan);
        assert!(sheet.columns.is_empty());
        assert!(sheet.rows.is_empty());

        let sheet = read_sheet(&[], ReportKind::CustomerFlow);
        assert!(sheet.rows.is_empty());
    }

    #[test]
    fn test_blank_header_cells_get_positional_names() {
        let grid = vec![
            vec![
                Data::String("客户名称".to_string()),
                Data::Empty,
                Data::String("数量".to_string()),
            ],
            text_row(&["客户甲", "x", "5"]),
        ];
        let sheet = read_sheet(&grid, ReportKind::OutputResults);
        assert_eq!(sheet.columns, vec!["客户名称", "col_1", "数量"]);
    }

    #[test]
    fn test_sentinel_marker_in_any_cell() {
        let row = vec![
            Data::Empty,
            Data::String(format!("{}：经销商", SENTINEL_MARKER)),
        ];
        assert!(row_contains_marker(&row, SENTINEL_MARKER));
        assert!(!row_contains_marker(&text_row(&["普通数据"]), SENTINEL_MARKER));
    }

    #[test]
    fn test_numeric_code_cells_stay_text_for_forced_columns() {
        let grid = vec![
            text_row(&["物料编码", "数量"]),
            vec![Data::Float(6901234.0), Data::Float(5.0)],
        ];
        let sheet = read_sheet(&grid, ReportKind::CustomerFlow);
        assert_eq!(sheet.rows[0][0], CellValue::Text("6901234".to_string()));
        assert_eq!(sheet.rows[0][1], CellValue::Integer(5));
    }
}
