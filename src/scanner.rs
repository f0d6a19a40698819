use crate::{
    config::Config,
    error::{Error, Result},
};
use globset::{Glob, GlobMatcher};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// A Markdown document selected for conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDocument {
    /// Path to the document
    pub path: PathBuf,

    /// File name without extension, used to name the intermediate and output files
    pub stem: String,
}

impl InputDocument {
    /// Creates an input document from a path.
    ///
    /// Returns `None` if the path has no usable file stem.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let stem = path.file_stem()?.to_string_lossy().into_owned();
        if stem.is_empty() {
            return None;
        }
        Some(Self { path, stem })
    }

    /// Returns the file name for display.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.stem.clone(), |n| n.to_string_lossy().into_owned())
    }
}

/// Result of scanning the input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The input directory does not exist
    MissingDirectory(PathBuf),

    /// The directory exists but contains no matching documents
    Empty(PathBuf),

    /// Documents to convert
    Found(Vec<InputDocument>),
}

impl ScanOutcome {
    /// Returns the documents found, if any.
    #[must_use]
    pub fn documents(&self) -> &[InputDocument] {
        match self {
            Self::Found(documents) => documents,
            Self::MissingDirectory(_) | Self::Empty(_) => &[],
        }
    }
}

/// Lists the documents directly inside the input directory.
pub(crate) struct Scanner {
    input_dir: PathBuf,
    matcher: GlobMatcher,
}

impl Scanner {
    /// Creates a new scanner from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the document glob is invalid.
    pub(crate) fn new(config: &Config) -> Result<Self> {
        let matcher = Glob::new(&config.document_glob)
            .map_err(|e| {
                Error::config(format!(
                    "Invalid document glob '{}': {}",
                    config.document_glob, e
                ))
            })?
            .compile_matcher();

        Ok(Self {
            input_dir: config.input_dir.clone(),
            matcher,
        })
    }

    /// Scans the input directory.
    ///
    /// A missing directory is not an error; it is reported as
    /// [`ScanOutcome::MissingDirectory`].
    pub(crate) fn scan(&self) -> ScanOutcome {
        if !self.input_dir.is_dir() {
            warn!("Input directory '{}' does not exist", self.input_dir.display());
            return ScanOutcome::MissingDirectory(self.input_dir.clone());
        }

        debug!("Scanning {}", self.input_dir.display());

        let mut documents = Vec::new();
        let walker = WalkDir::new(&self.input_dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true);

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    if !self.is_document(entry.path()) {
                        trace!("Skipping {}", entry.path().display());
                        continue;
                    }
                    if let Some(document) = InputDocument::from_path(entry.path()) {
                        documents.push(document);
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Walk error: {}", e),
            }
        }

        if documents.is_empty() {
            return ScanOutcome::Empty(self.input_dir.clone());
        }

        documents.sort_by(|a, b| a.path.cmp(&b.path));

        debug!("Found {} documents", documents.len());
        ScanOutcome::Found(documents)
    }

    fn is_document(&self, path: &Path) -> bool {
        path.file_name()
            .is_some_and(|name| self.matcher.is_match(Path::new(name)))
    }
}
