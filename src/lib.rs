//! # md2pdf
//!
//! Batch conversion of Markdown documents into styled, paginated PDF files.
//!
//! ## Features
//!
//! - Tables, syntax-highlighted fenced code, heading anchors with `[TOC]`,
//!   metadata headers
//! - One fixed stylesheet and A4 page layout for every document
//! - Pagination through `wkhtmltopdf`, or any [`Paginator`] implementation
//! - Intermediate files and the scratch directory are always cleaned up
//!
//! ## Quick Start
//!
//! ```no_run
//! use md2pdf::{Config, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .input_dir("./md")
//!     .output_dir("./pdf")
//!     .build()?;
//!
//! let summary = Pipeline::new(config)?.run()?;
//! summary.print_summary();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Each document passes through:
//! 1. **Scanner**: lists `*.md` files in the input directory
//! 2. **Markup renderer**: Markdown to a complete styled HTML document
//! 3. **Paginator**: HTML to PDF via the external engine
//! 4. **Verification**: the PDF must exist and be non-empty

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod highlight;
mod markup;
mod paginator;
mod pipeline;
mod scanner;
mod template;
mod workspace;

pub use config::{Config, ConfigBuilder, Margins, PageLayout, PageSize};
pub use error::{ENGINE_DOWNLOAD_URL, Error, Result};
pub use markup::{MarkupRenderer, Metadata, RenderedMarkup, TocEntry};
pub use paginator::{Paginator, Wkhtmltopdf};
pub use pipeline::{FileFailure, FileState, InputState, Pipeline, RunSummary};
pub use scanner::{InputDocument, ScanOutcome};

/// Runs a complete batch conversion with the given configuration.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - The pagination engine is not installed
/// - The output or temp directory cannot be created or the temp directory
///   cannot be removed
///
/// # Examples
///
/// ```no_run
/// use md2pdf::{Config, run};
///
/// # fn main() -> anyhow::Result<()> {
/// let summary = run(Config::builder().build()?)?;
/// println!("{} converted", summary.succeeded);
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config) -> Result<RunSummary> {
    Pipeline::new(config)?.run()
}
