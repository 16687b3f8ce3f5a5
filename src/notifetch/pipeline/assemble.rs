use tracing::debug;

use crate::notifetch::pipeline::error::Result;
use crate::notifetch::pipeline::flatten::FlattenedRecord;
use crate::notifetch::pipeline::model::{CellValue, Column, Row, Table};

/// Places each record's cells under the unified columns.
///
/// Produces one row per record in input order. Columns a record lacks get the
/// null marker. Fails with
/// [`SchemaViolation`](crate::notifetch::pipeline::error::ToolError::SchemaViolation)
/// if a row ever ends up with the wrong number of cells.
pub fn assemble(columns: Vec<Column>, records: &[FlattenedRecord]) -> Result<Table> {
    let rows: Vec<Row> = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|column| {
                    record
                        .get(&column.name)
                        .map(|cell| cell.value.clone())
                        .unwrap_or(CellValue::Null)
                })
                .collect()
        })
        .collect();

    debug!(
        column_count = columns.len(),
        row_count = rows.len(),
        "table assembled"
    );
    Table::new(columns, rows)
}
