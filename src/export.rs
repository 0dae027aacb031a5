//! Spreadsheet materialization of exported rows.

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};
use serde_json::{Map, Value};

/// Worksheet names are capped at 31 characters by the format.
const MAX_SHEET_NAME: usize = 31;

/// Build a downloadable workbook from a column list and JSON row objects.
pub fn write_workbook(
    sheet_name: &str,
    columns: &[String],
    rows: &[Map<String, Value>],
) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let name: String = sheet_name.chars().take(MAX_SHEET_NAME).collect();
    worksheet.set_name(&name)?;

    for (col, name) in columns.iter().enumerate() {
        worksheet.write_string(0, col as u16, name)?;
    }

    for (row_idx, row) in rows.iter().enumerate() {
        let row_num = (row_idx + 1) as u32;
        for (col_idx, column) in columns.iter().enumerate() {
            if let Some(value) = row.get(column) {
                write_value(worksheet, row_num, col_idx as u16, value)?;
            }
        }
    }

    workbook
        .save_to_buffer()
        .context("failed to serialize export workbook")
}

fn write_value(ws: &mut Worksheet, row: u32, col: u16, value: &Value) -> Result<()> {
    match value {
        Value::Null => { /* leave cell empty */ }
        Value::String(s) => {
            ws.write_string(row, col, s)?;
        }
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                ws.write_number(row, col, f)?;
            }
        }
        Value::Bool(b) => {
            ws.write_string(row, col, &b.to_string())?;
        }
        Value::Array(_) | Value::Object(_) => {
            ws.write_string(row, col, &value.to_string())?;
        }
    }
    Ok(())
}
