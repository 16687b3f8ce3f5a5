use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook, open_workbook_from_rs};

use crate::notifetch::pipeline::error::{Result, ToolError};
use crate::notifetch::pipeline::io::excel_write::DATA_SHEET;
use crate::notifetch::pipeline::model::{CellValue, Column, ColumnType, Row, Table};
use crate::notifetch::pipeline::unify::reconcile;

/// Reads a workbook produced by [`excel_write`](super::excel_write) back into
/// a table. Column types are inferred from the stored cells, so columns that
/// were exported as text (dates, lists) come back as `text`.
pub fn read_table(path: &Path) -> Result<Table> {
    if !path.exists() {
        return Err(ToolError::MissingInput(path.to_path_buf()));
    }
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    read_data_sheet(&mut workbook)
}

/// Same as [`read_table`] for an in-memory workbook.
pub fn read_table_from_bytes(bytes: Vec<u8>) -> Result<Table> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    read_data_sheet(&mut workbook)
}

fn read_data_sheet<R: Read + Seek>(workbook: &mut Xlsx<R>) -> Result<Table> {
    let sheet_name = if workbook.sheet_names().iter().any(|name| name == DATA_SHEET) {
        DATA_SHEET.to_string()
    } else {
        workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ToolError::InvalidWorkbook("workbook has no sheets".to_string()))?
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{sheet_name}'")))??;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = match rows_iter.next() {
        Some(first_row) => first_row.iter().map(cell_to_string).collect(),
        None => Vec::new(),
    };

    let mut types = vec![ColumnType::Unknown; headers.len()];
    let mut rows: Vec<Row> = Vec::new();
    for raw_row in rows_iter {
        let row: Row = (0..headers.len())
            .map(|idx| raw_row.get(idx).map(to_cell).unwrap_or(CellValue::Null))
            .collect();
        for (slot, cell) in types.iter_mut().zip(&row) {
            *slot = reconcile(*slot, cell_type(cell));
        }
        rows.push(row);
    }

    let columns = headers
        .into_iter()
        .zip(types)
        .enumerate()
        .map(|(ordinal, (name, column_type))| Column {
            name,
            column_type,
            ordinal,
        })
        .collect();

    Table::new(columns, rows)
}

fn to_cell(cell: &DataType) -> CellValue {
    match cell {
        DataType::Empty => CellValue::Null,
        DataType::Float(value) => CellValue::Number(*value),
        DataType::Int(value) => CellValue::Number(*value as f64),
        DataType::Bool(value) => CellValue::Boolean(*value),
        DataType::String(value) if value.is_empty() => CellValue::Null,
        DataType::String(value) => CellValue::Text(value.clone()),
        other => CellValue::Text(other.to_string()),
    }
}

fn cell_type(cell: &CellValue) -> ColumnType {
    match cell {
        CellValue::Null => ColumnType::Unknown,
        CellValue::Text(_) => ColumnType::Text,
        CellValue::Number(_) => ColumnType::Number,
        CellValue::Boolean(_) => ColumnType::Boolean,
    }
}

fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::String(value) => value.clone(),
        DataType::Empty => String::new(),
        other => other.to_string(),
    }
}
