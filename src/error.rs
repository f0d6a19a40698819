use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Link shown to users who still need to install the pagination engine.
pub const ENGINE_DOWNLOAD_URL: &str = "https://wkhtmltopdf.org/downloads.html";

/// Error types for the md2pdf library.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// The pagination engine executable is not installed where expected.
    #[error(
        "wkhtmltopdf was not found at '{path}'. Install it first, download: {}",
        ENGINE_DOWNLOAD_URL
    )]
    EngineNotFound {
        /// Path that was checked
        path: PathBuf,
    },

    /// Invalid UTF-8 encountered in an input document.
    #[error("Invalid UTF-8 encoding in file '{path}'. File may be binary or use unsupported encoding.")]
    InvalidUtf8 {
        /// Path to file with encoding issues
        path: PathBuf,
    },

    /// Template rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// The pagination engine could not be started or reported a failure.
    #[error("Pagination of '{path}' failed: {message}")]
    Paginate {
        /// Intermediate document handed to the engine
        path: PathBuf,
        /// Engine diagnostics
        message: String,
    },

    /// The engine returned but no output file exists.
    #[error("Output file '{path}' was not created")]
    MissingOutput {
        /// Expected output path
        path: PathBuf,
    },

    /// The engine returned but the output file is empty.
    #[error("Output file '{path}' is empty")]
    EmptyOutput {
        /// Output path
        path: PathBuf,
    },

    /// The engine returned but left an existing output file untouched.
    #[error("Output file '{path}' was not updated")]
    StaleOutput {
        /// Output path
        path: PathBuf,
    },

    /// Another input of the same batch already claimed this output name.
    #[error("'{path}' maps to '{stem}.pdf', which an earlier document of this batch already produces")]
    DuplicateStem {
        /// Input document that was skipped
        path: PathBuf,
        /// Shared file stem
        stem: String,
    },

    /// Syntax highlighting resources could not be loaded.
    #[error("Syntax highlighting error: {message}")]
    Highlight {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates an IO error for a failed read, mapping invalid data to
    /// [`Error::InvalidUtf8`].
    #[must_use]
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::InvalidData {
            Self::invalid_utf8(path)
        } else {
            Self::io(path, source)
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an engine-not-found error.
    #[must_use]
    pub fn engine_not_found(path: impl Into<PathBuf>) -> Self {
        Self::EngineNotFound { path: path.into() }
    }

    /// Creates an invalid UTF-8 error.
    #[must_use]
    pub fn invalid_utf8(path: impl Into<PathBuf>) -> Self {
        Self::InvalidUtf8 { path: path.into() }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, source: &tera::Error) -> Self {
        // tera nests the useful part of the message in the source chain
        let mut message = source.to_string();
        let mut cause = std::error::Error::source(source);
        while let Some(inner) = cause {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            cause = inner.source();
        }

        Self::Template {
            template: template.into(),
            message,
        }
    }

    /// Creates a pagination error.
    #[must_use]
    pub fn paginate(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Paginate {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a missing output error.
    #[must_use]
    pub fn missing_output(path: impl Into<PathBuf>) -> Self {
        Self::MissingOutput { path: path.into() }
    }

    /// Creates an empty output error.
    #[must_use]
    pub fn empty_output(path: impl Into<PathBuf>) -> Self {
        Self::EmptyOutput { path: path.into() }
    }

    /// Creates a stale output error.
    #[must_use]
    pub fn stale_output(path: impl Into<PathBuf>) -> Self {
        Self::StaleOutput { path: path.into() }
    }

    /// Creates a duplicate stem error.
    #[must_use]
    pub fn duplicate_stem(path: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self::DuplicateStem {
            path: path.into(),
            stem: stem.into(),
        }
    }

    /// Creates a highlighting error.
    #[must_use]
    pub fn highlight(message: impl Into<String>) -> Self {
        Self::Highlight {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if the error must stop the whole batch rather than a
    /// single file.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::EngineNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("test message");
        assert!(err.is_config());
        assert!(err.is_fatal());
        assert!(err.to_string().contains("test message"));
    }

    #[test]
    fn test_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io("/tmp/test.md", io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("/tmp/test.md"));
    }

    #[test]
    fn test_read_error_maps_invalid_data() {
        let io_err = std::io::Error::new(std::io::ErrorKind::InvalidData, "stream did not contain valid UTF-8");
        let err = Error::read("notes.md", io_err);
        assert!(matches!(err, Error::InvalidUtf8 { .. }));
        assert!(err.to_string().contains("notes.md"));
    }

    #[test]
    fn test_engine_not_found_mentions_download() {
        let err = Error::engine_not_found("/opt/wkhtmltopdf");
        assert!(err.is_fatal());
        let message = err.to_string();
        assert!(message.contains("/opt/wkhtmltopdf"));
        assert!(message.contains(ENGINE_DOWNLOAD_URL));
    }

    #[test]
    fn test_output_errors_are_per_file() {
        assert!(!Error::missing_output("a.pdf").is_fatal());
        assert!(!Error::empty_output("a.pdf").is_fatal());
        assert!(!Error::paginate("a.html", "exit status 1").is_fatal());
        assert!(!Error::stale_output("a.pdf").is_fatal());
        assert!(!Error::duplicate_stem("a.md", "a").is_fatal());
    }

    #[test]
    fn test_duplicate_stem_names_both_sides() {
        let message = Error::duplicate_stem("md/a.md", "a").to_string();
        assert!(message.contains("md/a.md"));
        assert!(message.contains("a.pdf"));
    }

    #[test]
    fn test_error_clone() {
        let err = Error::paginate("a.html", "boom");
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
