//! CLI binary for sheet-report.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServiceConfig` and either runs the HTTP server or inspects a workbook.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sheet_report::{inspect, start_server, ReportService, ServiceConfig};
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default address (127.0.0.1:5000), uploads in ./uploads
  sheet-report

  # Serve on all interfaces with a custom upload directory
  sheet-report serve --addr 0.0.0.0:8080 --upload-dir /var/lib/sheet-report

  # List the sheets of a workbook
  sheet-report inspect data.xlsx

  # Same, as JSON
  sheet-report inspect --json data.xlsx

ENDPOINTS:
  POST /upload                 multipart, part "file" (.xlsx)
  POST /process                {"path": ..., "sheets": [{"sheet", "operation", "columns"}]}
  POST /generate_pdf           report JSON → report.pdf
  POST /generate_graph         {"sheets": report JSON} → graph.png
  POST /generate_detailed_pdf  report JSON → detailed_report.pdf
  GET  /health

ENVIRONMENT VARIABLES:
  SHEET_REPORT_ADDR              Bind address
  SHEET_REPORT_UPLOAD_DIR        Upload directory
  SHEET_REPORT_DEBUG             Error responses carry a "detail" field
  SHEET_REPORT_NO_PAGINATE       Keep all PDF text on the first page
  SHEET_REPORT_CHART_FONT        TrueType font for chart labels (default: bundled)
  SHEET_REPORT_MAX_UPLOAD_BYTES  Upload size limit
  RUST_LOG                       Log filter, overrides -v / -q
"#;

#[derive(Parser, Debug)]
#[command(
    name = "sheet-report",
    version,
    about = "Aggregate spreadsheet columns and render them as PDF reports and bar charts",
    args_conflicts_with_subcommands = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Server options when no subcommand is given.
    #[command(flatten)]
    serve: ServeArgs,

    /// Debug-level logs.
    #[arg(short, long, global = true, env = "SHEET_REPORT_VERBOSE")]
    verbose: bool,

    /// Errors only.
    #[arg(short, long, global = true, env = "SHEET_REPORT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve(ServeArgs),
    /// Print the sheets of a workbook without storing it.
    Inspect(InspectArgs),
}

#[derive(Args, Debug, Clone)]
struct ServeArgs {
    /// Address to listen on, HOST:PORT.
    #[arg(long, env = "SHEET_REPORT_ADDR", default_value = "127.0.0.1:5000")]
    addr: String,

    /// Directory uploaded workbooks are stored in.
    #[arg(long, env = "SHEET_REPORT_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Add the underlying cause to error responses and log at debug level.
    #[arg(long, env = "SHEET_REPORT_DEBUG")]
    debug: bool,

    /// Let long reports run past the bottom of the first PDF page.
    #[arg(long, env = "SHEET_REPORT_NO_PAGINATE")]
    no_paginate: bool,

    /// TrueType font for chart labels. The bundled DejaVu Sans is used if unset.
    #[arg(long, env = "SHEET_REPORT_CHART_FONT")]
    chart_font: Option<PathBuf>,

    /// Largest accepted upload in bytes.
    #[arg(long, env = "SHEET_REPORT_MAX_UPLOAD_BYTES", default_value_t = sheet_report::config::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Path to an .xlsx workbook.
    file: PathBuf,

    /// Print `{filename, num_sheets, sheets}` as JSON.
    #[arg(long)]
    json: bool,
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();
}

fn build_config(args: &ServeArgs) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder()
        .bind_addr(args.addr.clone())
        .upload_dir(args.upload_dir.clone())
        .debug(args.debug)
        .paginate(!args.no_paginate)
        .max_upload_bytes(args.max_upload_bytes);
    if let Some(ref font) = args.chart_font {
        builder = builder.chart_font(font.clone());
    }
    builder.build().context("Invalid configuration")
}

async fn run_inspect(args: InspectArgs) -> Result<()> {
    let summary = inspect(&args.file)
        .await
        .with_context(|| format!("Failed to inspect {}", args.file.display()))?;

    if args.json {
        let json = serde_json::json!({
            "filename": summary.filename,
            "num_sheets": summary.num_sheets,
            "sheets": summary.sheet_names,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).context("Failed to serialise summary")?
        );
    } else {
        println!("File:    {}", args.file.display());
        println!("Sheets:  {}", summary.num_sheets);
        for (i, name) in summary.sheet_names.iter().enumerate() {
            println!("  {:>2}. {}", i + 1, name);
        }
    }
    Ok(())
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = build_config(&args)?;
    let service = ReportService::new(config).context("Failed to start report service")?;
    info!("sheet-report {}", env!("CARGO_PKG_VERSION"));
    start_server(service)
        .await
        .with_context(|| format!("Server on {} failed", args.addr))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Inspect(args)) => {
            init_logging(cli.verbose, cli.quiet);
            run_inspect(args).await
        }
        Some(Command::Serve(args)) => {
            init_logging(cli.verbose || args.debug, cli.quiet);
            run_serve(args).await
        }
        None => {
            init_logging(cli.verbose || cli.serve.debug, cli.quiet);
            run_serve(cli.serve).await
        }
    }
}
