use csv::{QuoteStyle, WriterBuilder};

use crate::notifetch::pipeline::error::{Result, ToolError};
use crate::notifetch::pipeline::model::Table;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// CSV encoding switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CsvOptions {
    /// Prefix the output with a UTF-8 byte order mark so spreadsheet
    /// applications pick the right encoding.
    pub byte_order_mark: bool,
}

/// Encodes the table as RFC 4180 CSV: a header row of column names, then one
/// record per row. Null cells become empty fields.
pub fn encode_csv(table: &Table, options: &CsvOptions) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    if options.byte_order_mark {
        buffer.extend_from_slice(UTF8_BOM);
    }

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(csv::Terminator::CRLF)
        .from_writer(buffer);

    writer.write_record(table.column_names())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|cell| cell.as_text().unwrap_or_default()))?;
    }

    writer
        .into_inner()
        .map_err(|error| ToolError::Io(error.into_error()))
}
