//! Prompt-ready digest of a table for the analysis collaborator: column
//! types and statistics plus a bounded sample of rows.

use std::collections::HashSet;
use std::fmt::Write;

use serde::Serialize;

use crate::notifetch::pipeline::model::{CellValue, ColumnType, Table, format_number};

/// How many rows to include as a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplePolicy {
    pub rows: usize,
}

impl SamplePolicy {
    /// Small tables are sent whole; up to 1000 rows send the first 100;
    /// anything larger sends the first 200.
    pub fn for_rows(total: usize) -> Self {
        let rows = match total {
            0..=100 => total,
            101..=1000 => 100,
            _ => 200,
        };
        Self { rows }
    }
}

/// Numeric statistics of a `number` column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Per-column digest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub column_type: ColumnType,
    pub non_null: usize,
    pub unique: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericStats>,
}

/// Digest of a whole table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<ColumnSummary>,
    pub sample: Vec<Vec<serde_json::Value>>,
}

impl TableSummary {
    pub fn build(table: &Table, policy: SamplePolicy) -> Self {
        let columns = table
            .columns()
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let cells = table.rows().iter().filter_map(|row| row.get(index));
                summarize_column(&column.name, column.column_type, cells)
            })
            .collect();

        let sample = table
            .rows()
            .iter()
            .take(policy.rows)
            .map(|row| row.iter().map(CellValue::to_json).collect())
            .collect();

        Self {
            row_count: table.rows().len(),
            column_count: table.columns().len(),
            columns,
            sample,
        }
    }

    /// Plain-text rendering suitable for embedding in a prompt.
    pub fn to_prompt_text(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "Rows: {}", self.row_count);
        let _ = writeln!(text, "Columns: {}", self.column_count);
        for column in &self.columns {
            let _ = write!(
                text,
                "- {} ({}): {}/{} non-null, {} unique",
                column.name, column.column_type, column.non_null, self.row_count, column.unique
            );
            if let Some(stats) = &column.numeric {
                let _ = write!(
                    text,
                    ", min={}, max={}, mean={:.2}",
                    format_number(stats.min),
                    format_number(stats.max),
                    stats.mean
                );
            }
            text.push('\n');
        }

        if !self.sample.is_empty() {
            let _ = writeln!(text, "\nSample ({} rows):", self.sample.len());
            let header: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
            let _ = writeln!(text, "{}", header.join("\t"));
            for row in &self.sample {
                let cells: Vec<String> = row
                    .iter()
                    .map(|value| match value {
                        serde_json::Value::Null => String::new(),
                        serde_json::Value::String(cell) => cell.replace(['\t', '\n'], " "),
                        other => other.to_string(),
                    })
                    .collect();
                let _ = writeln!(text, "{}", cells.join("\t"));
            }
        }
        text
    }
}

fn summarize_column<'a>(
    name: &str,
    column_type: ColumnType,
    cells: impl Iterator<Item = &'a CellValue>,
) -> ColumnSummary {
    let mut non_null = 0;
    let mut distinct: HashSet<String> = HashSet::new();
    let mut numbers: Vec<f64> = Vec::new();

    for cell in cells {
        let Some(text) = cell.as_text() else {
            continue;
        };
        non_null += 1;
        if let CellValue::Number(value) = cell {
            numbers.push(*value);
        }
        distinct.insert(text);
    }

    let numeric = (column_type == ColumnType::Number && !numbers.is_empty()).then(|| {
        let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
        let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
        NumericStats { min, max, mean }
    });

    ColumnSummary {
        name: name.to_string(),
        column_type,
        non_null,
        unique: distinct.len(),
        numeric,
    }
}
