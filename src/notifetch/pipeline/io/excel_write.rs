use std::collections::HashSet;

use rust_xlsxwriter::{TableColumn, Workbook, Worksheet};
use tracing::warn;

use crate::notifetch::pipeline::error::Result;
use crate::notifetch::pipeline::model::{CellValue, ColumnType, Table};

/// Name of the single worksheet in exported workbooks.
pub const DATA_SHEET: &str = "Data";

/// Longest string a worksheet cell can hold, in characters.
pub const MAX_CELL_CHARS: usize = 32_767;

/// Encodes the table as an XLSX workbook with one sheet. Number columns keep
/// numeric cells and boolean columns keep boolean cells; null cells are left
/// blank. Text longer than [`MAX_CELL_CHARS`] is truncated.
pub fn encode_workbook(table: &Table) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(DATA_SHEET)?;

    for (col_idx, column) in table.columns().iter().enumerate() {
        write_text(worksheet, 0, col_idx as u16, &column.name)?;
    }

    for (row_idx, row) in table.rows().iter().enumerate() {
        let excel_row = (row_idx + 1) as u32;
        for (col_idx, (cell, column)) in row.iter().zip(table.columns()).enumerate() {
            let col = col_idx as u16;
            match (cell, column.column_type) {
                (CellValue::Null, _) => {}
                (CellValue::Number(value), ColumnType::Number) => {
                    worksheet.write_number(excel_row, col, *value)?;
                }
                (CellValue::Boolean(value), ColumnType::Boolean) => {
                    worksheet.write_boolean(excel_row, col, *value)?;
                }
                (other, _) => {
                    let text = other.as_text().unwrap_or_default();
                    write_text(worksheet, excel_row, col, &text)?;
                }
            }
        }
    }

    if !table.columns().is_empty() && !table.is_empty() {
        let col_end = (table.columns().len() as u16).saturating_sub(1);
        let row_end = table.rows().len() as u32;

        if table_headers_allowed(table) {
            let headers: Vec<TableColumn> = table
                .columns()
                .iter()
                .map(|column| TableColumn::new().set_header(clamp(&column.name)))
                .collect();
            let mut excel_table = rust_xlsxwriter::Table::new();
            excel_table.set_autofilter(true).set_columns(&headers);
            worksheet.add_table(0, 0, row_end, col_end, &excel_table)?;
        } else {
            warn!("column names collide ignoring case; writing a plain autofilter instead of a table");
            worksheet.autofilter(0, 0, row_end, col_end)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn write_text(worksheet: &mut Worksheet, row: u32, col: u16, text: &str) -> Result<()> {
    if text.chars().count() > MAX_CELL_CHARS {
        warn!(row, col, length = text.chars().count(), "cell text truncated to the worksheet limit");
    }
    worksheet.write_string(row, col, clamp(text))?;
    Ok(())
}

fn clamp(text: &str) -> &str {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Worksheet tables need non-empty headers that are unique ignoring case.
fn table_headers_allowed(table: &Table) -> bool {
    let mut seen = HashSet::new();
    table
        .column_names()
        .all(|name| !name.is_empty() && seen.insert(clamp(name).to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_cuts_on_character_boundaries() {
        let long = "é".repeat(MAX_CELL_CHARS + 5);
        assert_eq!(clamp(&long).chars().count(), MAX_CELL_CHARS);
        assert_eq!(clamp("short"), "short");
    }
}
