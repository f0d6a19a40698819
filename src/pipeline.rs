use crate::{
    config::Config,
    error::{Error, Result},
    markup::MarkupRenderer,
    paginator::{Paginator, Wkhtmltopdf},
    scanner::{InputDocument, ScanOutcome, Scanner},
    template::TemplateEngine,
    workspace::TempWorkspace,
};
use std::{
    collections::HashSet,
    fmt, fs,
    path::{Path, PathBuf},
    time::{Duration, Instant, SystemTime},
};
use tracing::{debug, error, info, instrument, trace};

/// Furthest state a document reached in the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileState {
    /// Selected by the scanner
    Scanned,
    /// Intermediate HTML written
    Rendered,
    /// Engine finished
    Paginated,
    /// Output checked to exist and be non-empty
    Verified,
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scanned => "scanned",
            Self::Rendered => "rendered",
            Self::Paginated => "paginated",
            Self::Verified => "verified",
        };
        f.write_str(name)
    }
}

/// A document that could not be converted.
#[derive(Debug, Clone)]
pub struct FileFailure {
    /// File name of the input document
    pub file: String,

    /// Last state reached before the failure
    pub state: FileState,

    /// What went wrong
    pub error: Error,
}

/// What the scanner found in the input directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputState {
    /// The input directory does not exist
    Missing,
    /// The directory holds no matching documents
    NoDocuments,
    /// Documents were found and processed
    Documents,
}

/// Counts collected during one batch run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Input directory that was scanned
    pub input_directory: String,

    /// Output directory path
    pub output_directory: String,

    /// Scan result
    pub input_state: InputState,

    /// Documents found by the scanner
    pub scanned: usize,

    /// Documents converted and verified
    pub succeeded: usize,

    /// Documents that failed at any stage
    pub failed: usize,

    /// Details of every failure
    pub failures: Vec<FileFailure>,

    /// Total execution time
    pub duration: Duration,
}

impl RunSummary {
    fn new(config: &Config, outcome: &ScanOutcome) -> Self {
        let input_state = match outcome {
            ScanOutcome::MissingDirectory(_) => InputState::Missing,
            ScanOutcome::Empty(_) => InputState::NoDocuments,
            ScanOutcome::Found(_) => InputState::Documents,
        };

        Self {
            input_directory: config.input_dir.display().to_string(),
            output_directory: config.output_dir.display().to_string(),
            input_state,
            scanned: outcome.documents().len(),
            succeeded: 0,
            failed: 0,
            failures: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Returns true if every scanned document was converted.
    #[must_use]
    pub const fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        match self.input_state {
            InputState::Missing => {
                println!("Error: input directory '{}' does not exist!", self.input_directory);
                return;
            }
            InputState::NoDocuments => {
                println!("No Markdown files found in {}", self.input_directory);
                return;
            }
            InputState::Documents => {}
        }

        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║               Conversion Summary                      ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!(
            "║ Documents found:      {:>8}                        ║",
            self.scanned
        );
        println!(
            "║   - Succeeded:        {:>8}                        ║",
            self.succeeded
        );
        println!(
            "║   - Failed:           {:>8}                        ║",
            self.failed
        );
        println!(
            "║ Total time:           {:>8.2}s                       ║",
            self.duration.as_secs_f64()
        );
        println!("╚═══════════════════════════════════════════════════════╝");

        for failure in &self.failures {
            println!("  ✗ {} ({}): {}", failure.file, failure.state, failure.error);
        }

        println!("\nPDF files saved to: {}\n", self.output_directory);
    }
}

/// Batch driver: scan, render, paginate, verify and clean up every document.
pub struct Pipeline {
    config: Config,
    scanner: Scanner,
    renderer: MarkupRenderer,
    templates: TemplateEngine,
    paginator: Box<dyn Paginator>,
}

impl Pipeline {
    /// Creates a pipeline that paginates with `wkhtmltopdf` from the
    /// configured engine path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The engine executable is not found
    pub fn new(config: Config) -> Result<Self> {
        let engine = Wkhtmltopdf::new(config.engine_path.clone(), config.layout.clone());
        Self::with_paginator(config, Box::new(engine))
    }

    /// Creates a pipeline with a specific pagination engine.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The engine reports itself unavailable
    /// - The document template fails to load
    pub fn with_paginator(config: Config, paginator: Box<dyn Paginator>) -> Result<Self> {
        config.validate()?;
        paginator.ensure_available()?;
        debug!("Paginating with {}", paginator.name());

        let scanner = Scanner::new(&config)?;
        let templates = TemplateEngine::new()?;

        Ok(Self {
            config,
            scanner,
            renderer: MarkupRenderer::new(),
            templates,
            paginator,
        })
    }

    /// Converts every document in the input directory.
    ///
    /// Per-document failures are counted, not returned. The temp directory
    /// is removed before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the output or temp directory cannot be created,
    /// or the temp directory cannot be removed at the end.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use md2pdf::{Config, Pipeline};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::builder()
    ///     .input_dir("./notes")
    ///     .build()?;
    ///
    /// let summary = Pipeline::new(config)?.run()?;
    /// summary.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(input_dir = %self.config.input_dir.display()))]
    pub fn run(&self) -> Result<RunSummary> {
        let start_time = Instant::now();

        fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| Error::io(&self.config.output_dir, e))?;
        let workspace = TempWorkspace::acquire(&self.config.temp_dir)?;
        trace!("Intermediate documents go to {}", workspace.path().display());

        let outcome = self.scanner.scan();
        let mut summary = RunSummary::new(&self.config, &outcome);

        if let ScanOutcome::Found(documents) = &outcome {
            info!("Found {} Markdown files", documents.len());

            let mut claimed = HashSet::new();
            for document in documents {
                let result = if claimed.insert(output_key(&document.stem)) {
                    self.convert_file(&workspace, document)
                } else {
                    Err((
                        FileState::Scanned,
                        Error::duplicate_stem(&document.path, &document.stem),
                    ))
                };

                match result {
                    Ok(output) => {
                        info!("Converted: {}", output.display());
                        summary.succeeded += 1;
                    }
                    Err((state, err)) => {
                        error!(
                            "Conversion of {} failed after {}: {}",
                            document.file_name(),
                            state,
                            err
                        );
                        summary.failed += 1;
                        summary.failures.push(FileFailure {
                            file: document.file_name(),
                            state,
                            error: err,
                        });
                    }
                }
            }
        }

        workspace.close()?;
        summary.duration = start_time.elapsed();

        debug!(
            "Batch finished: {} succeeded, {} failed in {:.2}s",
            summary.succeeded,
            summary.failed,
            summary.duration.as_secs_f64()
        );

        Ok(summary)
    }

    /// Runs one document through the conversion states.
    ///
    /// The intermediate file is removed when this returns, on every path.
    fn convert_file(
        &self,
        workspace: &TempWorkspace,
        document: &InputDocument,
    ) -> std::result::Result<PathBuf, (FileState, Error)> {
        info!("Converting: {}", document.file_name());

        let source = fs::read_to_string(&document.path)
            .map_err(|e| (FileState::Scanned, Error::read(&document.path, e)))?;
        let html = self
            .render_document(&source, document)
            .map_err(at(FileState::Scanned))?;
        let intermediate = workspace
            .write_intermediate(&document.stem, &html)
            .map_err(at(FileState::Scanned))?;
        trace!("{} -> {}", document.file_name(), intermediate.path().display());

        let output = self.config.output_path(&document.stem);
        let previous = modified_time(&output);
        if previous.is_some() {
            debug!("Replacing existing {}", output.display());
        }
        self.paginator
            .paginate(intermediate.path(), &output)
            .map_err(at(FileState::Rendered))?;
        drop(intermediate);

        verify_output(&output, previous).map_err(at(FileState::Paginated))?;
        trace!("{} {}", document.file_name(), FileState::Verified);

        Ok(output)
    }

    fn render_document(&self, source: &str, document: &InputDocument) -> Result<String> {
        let parent = document
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let base_dir = parent.canonicalize().ok();

        let markup = self.renderer.render(source, base_dir.as_deref());
        self.templates.render(&markup, &document.stem)
    }
}

fn at(state: FileState) -> impl FnOnce(Error) -> (FileState, Error) {
    move |e| (state, e)
}

/// Name under which an output file is claimed within one batch.
fn output_key(stem: &str) -> String {
    if cfg!(any(windows, target_os = "macos")) {
        stem.to_lowercase()
    } else {
        stem.to_string()
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Checks the engine left a non-empty file, newer than `previous` when an
/// output already existed before it ran.
fn verify_output(path: &Path, previous: Option<SystemTime>) -> Result<()> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::missing_output(path));
        }
        Err(e) => return Err(Error::io(path, e)),
    };

    if !metadata.is_file() {
        return Err(Error::missing_output(path));
    }
    if metadata.len() == 0 {
        return Err(Error::empty_output(path));
    }
    if previous.is_some() && metadata.modified().ok() == previous {
        return Err(Error::stale_output(path));
    }
    Ok(())
}
