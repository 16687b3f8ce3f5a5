use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use notifetch::config::PipelineConfig;
use notifetch::fetch::http::NotionHttp;
use notifetch::fetch::{FetchCursor, Fetcher, SourceId, SourceKind, ThreadSleeper};
use notifetch::flatten::{ChildBlockMode, Flattener};
use notifetch::io::{CsvOptions, ExportFormat};
use notifetch::normalize::Normalizer;
use notifetch::secrets::{BearerToken, EnvSecrets};
use notifetch::sync::{self, RunEnd};
use notifetch::{Result, ToolError, logging};

fn main() {
    let cli = Cli::parse();
    if let Err(error) = logging::init(cli.verbose) {
        eprintln!("warning: {error}");
    }
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Export(args) => execute_export(args),
        Command::Summarize(args) => execute_summarize(args),
        Command::Check(args) => execute_check(args),
    }
}

fn execute_export(args: ExportArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }
    if args.include_content {
        config.include_page_content = true;
    }
    if args.promote_blocks {
        config.flatten.child_blocks = ChildBlockMode::Promote;
    }
    config.validate()?;

    let format = args
        .format
        .map(ExportFormat::from)
        .or_else(|| ExportFormat::detect(&args.output))
        .ok_or_else(|| ToolError::UnsupportedFormat(args.output.display().to_string()))?;
    let source = SourceId::parse(&args.source)?;
    let cursor = args
        .resume_from
        .as_deref()
        .map(FetchCursor::load)
        .transpose()?;

    let token = BearerToken::from_provider(&EnvSecrets, &config.secret_name)?;
    let service = NotionHttp::new(&config.api, token)?;
    let sleeper = ThreadSleeper;
    let fetcher = Fetcher::new(&service, &sleeper, config.fetch_options());
    let flattener = Flattener::new(
        config.flatten.clone(),
        Normalizer::new(config.list_delimiter.clone()),
    );

    let run = sync::fetch_table(&fetcher, &flattener, &source, args.kind.into(), cursor)?;
    sync::export_table(
        &run.table,
        &args.output,
        format,
        &CsvOptions {
            byte_order_mark: args.bom,
        },
    )?;
    if let Some(path) = &args.cursor_file {
        run.cursor.save(path)?;
    }

    println!(
        "exported {} rows x {} columns from {} {} to {}",
        run.table.rows().len(),
        run.table.columns().len(),
        run.kind,
        source,
        args.output.display()
    );
    if !run.warnings.is_empty() {
        println!("{} flatten warnings (see log)", run.warnings.len());
    }

    match run.end {
        RunEnd::Complete => Ok(()),
        RunEnd::Cancelled => {
            println!("fetch cancelled after {} records", run.cursor.retrieved());
            Ok(())
        }
        RunEnd::Interrupted(error) => {
            if args.cursor_file.is_none() {
                eprintln!("hint: pass --cursor-file to keep the resume position");
            }
            Err(error)
        }
    }
}

fn execute_summarize(args: SummarizeArgs) -> Result<()> {
    let summary = sync::summarize_workbook(&args.input, args.sample)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary.to_prompt_text());
    }
    Ok(())
}

fn execute_check(args: CheckArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let token = BearerToken::from_provider(&EnvSecrets, &config.secret_name)?;
    let service = NotionHttp::new(&config.api, token)?;
    let name = service.check_connection()?;
    println!("connected as {name}");
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path),
        None => Ok(PipelineConfig::default()),
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Fetch pages and databases into flat tables and export them."
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a source and export it as CSV, Excel, or HTML.
    Export(ExportArgs),
    /// Summarize a previously exported workbook for analysis prompts.
    Summarize(SummarizeArgs),
    /// Verify that the configured token is accepted.
    Check(CheckArgs),
}

#[derive(clap::Args)]
struct ExportArgs {
    /// Page or database identifier, or its share URL.
    #[arg(long)]
    source: String,

    /// Output file path.
    #[arg(long)]
    output: PathBuf,

    /// Export format. Guessed from the output extension when omitted.
    #[arg(long, value_enum)]
    format: Option<FormatKind>,

    /// What the source is. `auto` asks the service.
    #[arg(long, value_enum, default_value_t = KindArg::Auto)]
    kind: KindArg,

    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Records per page request (1-100).
    #[arg(long)]
    page_size: Option<u32>,

    /// Fetch each database row's page content into a `content` column.
    #[arg(long)]
    include_content: bool,

    /// Give each top-level content block its own column.
    #[arg(long)]
    promote_blocks: bool,

    /// Resume from a cursor file written by an earlier run.
    #[arg(long)]
    resume_from: Option<PathBuf>,

    /// Write the final cursor here.
    #[arg(long)]
    cursor_file: Option<PathBuf>,

    /// Prefix CSV output with a UTF-8 byte order mark.
    #[arg(long)]
    bom: bool,
}

#[derive(clap::Args)]
struct SummarizeArgs {
    /// Workbook written by `export`.
    #[arg(long)]
    input: PathBuf,

    /// Number of sample rows. Defaults to a size-based policy.
    #[arg(long)]
    sample: Option<usize>,

    /// Print JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FormatKind {
    Csv,
    Excel,
    Html,
}

impl From<FormatKind> for ExportFormat {
    fn from(kind: FormatKind) -> Self {
        match kind {
            FormatKind::Csv => ExportFormat::Csv,
            FormatKind::Excel => ExportFormat::Excel,
            FormatKind::Html => ExportFormat::Html,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Auto,
    Database,
    Page,
}

impl From<KindArg> for Option<SourceKind> {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Auto => None,
            KindArg::Database => Some(SourceKind::Database),
            KindArg::Page => Some(SourceKind::Page),
        }
    }
}
