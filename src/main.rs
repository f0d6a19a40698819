use anyhow::Context;
use clap::Parser;
use md2pdf::{Config, Pipeline};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert a directory of Markdown files into styled PDF documents",
    long_about = "Convert every Markdown file in a directory into a styled, paginated PDF.\n\n\
    Each document is rendered to HTML with a fixed stylesheet and laid out on A4 pages \
    by wkhtmltopdf. Running without arguments converts ./md into ./pdf.\n\n\
    USAGE EXAMPLES:\n  \
      # Convert ./md into ./pdf\n  \
      md2pdf\n\n  \
      # Convert another folder, no prompt at the end\n  \
      md2pdf --input ./notes --output ./notes-pdf --no-wait"
)]
struct Cli {
    /// Directory containing the Markdown files
    #[arg(short, long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Directory receiving the PDF files
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Scratch directory for intermediate HTML (deleted after the run)
    #[arg(long, value_name = "PATH")]
    temp_dir: Option<PathBuf>,

    /// Path to the wkhtmltopdf executable
    #[arg(long, value_name = "FILE")]
    engine: Option<PathBuf>,

    /// Exit immediately instead of waiting for Enter
    #[arg(long)]
    no_wait: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_tracing(cli.verbose);

    let code = match convert(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    };

    if !cli.no_wait {
        wait_for_enter();
    }

    code
}

/// Runs the batch; returns whether every document converted.
fn convert(cli: &Cli) -> anyhow::Result<bool> {
    let mut builder = Config::builder();

    if let Some(input) = &cli.input {
        builder = builder.input_dir(input);
    }
    if let Some(output) = &cli.output {
        builder = builder.output_dir(output);
    }
    if let Some(temp_dir) = &cli.temp_dir {
        builder = builder.temp_dir(temp_dir);
    }
    if let Some(engine) = &cli.engine {
        builder = builder.engine_path(engine);
    }

    let config = builder.build().context("Failed to build configuration")?;

    let summary = Pipeline::new(config)
        .context("Failed to create pipeline")?
        .run()
        .context("Batch conversion failed")?;

    summary.print_summary();
    Ok(summary.all_succeeded())
}

fn wait_for_enter() {
    print!("\nPress Enter to exit...");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
}

fn setup_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::new("md2pdf=info"),
        1 => EnvFilter::new("md2pdf=debug"),
        _ => EnvFilter::new("md2pdf=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .init();
}
