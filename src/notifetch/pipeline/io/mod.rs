//! Export encoders. Each one is a pure function of a [`Table`] that returns
//! the encoded bytes; writing them somewhere is the caller's business.

pub mod csv_write;
pub mod excel_read;
pub mod excel_write;
pub mod html_write;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::notifetch::pipeline::error::{Result, ToolError};
use crate::notifetch::pipeline::model::Table;

pub use csv_write::CsvOptions;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Excel,
    Html,
}

impl ExportFormat {
    /// Guesses the format from a file extension.
    pub fn detect(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        extension.parse().ok()
    }
}

impl FromStr for ExportFormat {
    type Err = ToolError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" | "excel" => Ok(ExportFormat::Excel),
            "html" | "htm" => Ok(ExportFormat::Html),
            other => Err(ToolError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Excel => write!(f, "xlsx"),
            ExportFormat::Html => write!(f, "html"),
        }
    }
}

/// Encodes `table` in `format` with default options.
pub fn encode(table: &Table, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Csv => csv_write::encode_csv(table, &CsvOptions::default()),
        ExportFormat::Excel => excel_write::encode_workbook(table),
        ExportFormat::Html => Ok(html_write::encode_html(table).into_bytes()),
    }
}
