use std::fs;
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::notifetch::pipeline::assemble::assemble;
use crate::notifetch::pipeline::error::{Result, ToolError};
use crate::notifetch::pipeline::fetch::{FetchCursor, FetchStatus, Fetcher, SourceId, SourceKind};
use crate::notifetch::pipeline::flatten::{FlattenWarning, Flattener};
use crate::notifetch::pipeline::io::excel_read;
use crate::notifetch::pipeline::io::{CsvOptions, ExportFormat, csv_write, encode};
use crate::notifetch::pipeline::model::{RemoteRecord, Table};
use crate::notifetch::pipeline::summary::{SamplePolicy, TableSummary};
use crate::notifetch::pipeline::unify::unify;

/// How a pipeline run ended.
#[derive(Debug)]
pub enum RunEnd {
    Complete,
    /// Stopped at a page boundary on request.
    Cancelled,
    /// Stopped by an error. The run's table holds every record fetched
    /// before it and the run's cursor resumes right after them.
    Interrupted(ToolError),
}

/// Result of fetching a source into a table.
#[derive(Debug)]
pub struct PipelineRun {
    pub kind: SourceKind,
    pub table: Table,
    pub cursor: FetchCursor,
    pub warnings: Vec<FlattenWarning>,
    pub end: RunEnd,
}

impl PipelineRun {
    /// Converts an interrupted run into its error, dropping the partial
    /// table.
    pub fn into_result(self) -> Result<Self> {
        match self.end {
            RunEnd::Interrupted(error) => Err(error),
            _ => Ok(self),
        }
    }
}

/// Flattens, unifies, and assembles already fetched records.
pub fn build_table(
    records: &[RemoteRecord],
    flattener: &Flattener,
) -> Result<(Table, Vec<FlattenWarning>)> {
    let flattened = flattener.flatten_all(records);
    let warnings: Vec<FlattenWarning> = flattened
        .iter()
        .flat_map(|record| record.warnings.iter().cloned())
        .collect();
    let columns = unify(&flattened);
    debug!(column_count = columns.len(), "schema unified");
    let table = assemble(columns, &flattened)?;
    Ok((table, warnings))
}

/// Fetches a source and assembles the table.
///
/// `kind` skips source identification when the caller already knows it.
/// Failures before any page arrives (identification, configuration) are
/// returned as errors; failures mid-fetch end the run with
/// [`RunEnd::Interrupted`] so the records fetched so far are not lost.
#[instrument(
    level = "info",
    skip_all,
    fields(source = %source, resume_from = cursor.as_ref().map(FetchCursor::retrieved))
)]
pub fn fetch_table(
    fetcher: &Fetcher<'_>,
    flattener: &Flattener,
    source: &SourceId,
    kind: Option<SourceKind>,
    cursor: Option<FetchCursor>,
) -> Result<PipelineRun> {
    let kind = match kind {
        Some(kind) => kind,
        None => fetcher.identify(source)?,
    };
    info!(%kind, "fetching source");

    let start = cursor.clone().unwrap_or_default();
    let mut records = Vec::new();
    let (cursor, end) = match fetcher.fetch_into(source, kind, cursor, &mut records) {
        Ok((cursor, FetchStatus::Complete)) => (cursor, RunEnd::Complete),
        Ok((cursor, FetchStatus::Cancelled)) => (cursor, RunEnd::Cancelled),
        Err(error) => {
            let cursor = error.resume_cursor().cloned().unwrap_or(start);
            warn!(retrieved = cursor.retrieved(), %error, "fetch interrupted; keeping partial results");
            (cursor, RunEnd::Interrupted(error))
        }
    };

    let (table, warnings) = build_table(&records, flattener)?;
    info!(
        row_count = table.rows().len(),
        column_count = table.columns().len(),
        warning_count = warnings.len(),
        "table assembled"
    );

    Ok(PipelineRun {
        kind,
        table,
        cursor,
        warnings,
        end,
    })
}

/// Encodes the table and writes it to `output`.
#[instrument(
    level = "info",
    skip_all,
    fields(output = %output.display(), %format)
)]
pub fn export_table(
    table: &Table,
    output: &Path,
    format: ExportFormat,
    csv_options: &CsvOptions,
) -> Result<()> {
    let bytes = match format {
        ExportFormat::Csv => csv_write::encode_csv(table, csv_options)?,
        other => encode(table, other)?,
    };
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, &bytes)?;
    info!(byte_count = bytes.len(), "export written");
    Ok(())
}

/// Loads an exported workbook and summarizes it. `sample_rows` overrides the
/// size-based sample policy.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn summarize_workbook(input: &Path, sample_rows: Option<usize>) -> Result<TableSummary> {
    let table = excel_read::read_table(input)?;
    let policy = sample_rows
        .map(|rows| SamplePolicy { rows })
        .unwrap_or_else(|| SamplePolicy::for_rows(table.rows().len()));
    info!(row_count = table.rows().len(), sample = policy.rows, "workbook loaded");
    Ok(TableSummary::build(&table, policy))
}
