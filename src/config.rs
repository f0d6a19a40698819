use crate::error::{Error, Result};
use globset::Glob;
use std::path::{Path, PathBuf};

const DEFAULT_INPUT_DIR: &str = "md";
const DEFAULT_OUTPUT_DIR: &str = "pdf";
const DEFAULT_TEMP_DIR: &str = "temp_html";
const DEFAULT_DOCUMENT_GLOB: &str = "*.md";
const DEFAULT_MARGIN_MM: u32 = 20;
const MAX_MARGIN_MM: u32 = 100;

#[cfg(windows)]
const DEFAULT_ENGINE_PATH: &str = r"C:\Program Files\wkhtmltopdf\bin\wkhtmltopdf.exe";
#[cfg(not(windows))]
const DEFAULT_ENGINE_PATH: &str = "/usr/local/bin/wkhtmltopdf";

/// Paper size passed to the pagination engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    /// ISO A3
    A3,
    /// ISO A4
    #[default]
    A4,
    /// ISO A5
    A5,
    /// US Letter
    Letter,
    /// US Legal
    Legal,
}

impl PageSize {
    /// Returns the engine's name for this size.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A3 => "A3",
            Self::A4 => "A4",
            Self::A5 => "A5",
            Self::Letter => "Letter",
            Self::Legal => "Legal",
        }
    }
}

/// Page margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Margins {
    /// Top margin
    pub top_mm: u32,
    /// Right margin
    pub right_mm: u32,
    /// Bottom margin
    pub bottom_mm: u32,
    /// Left margin
    pub left_mm: u32,
}

impl Margins {
    /// The same margin on all four sides.
    #[must_use]
    pub const fn uniform(mm: u32) -> Self {
        Self {
            top_mm: mm,
            right_mm: mm,
            bottom_mm: mm,
            left_mm: mm,
        }
    }

    const fn largest(self) -> u32 {
        let mut max = self.top_mm;
        if self.right_mm > max {
            max = self.right_mm;
        }
        if self.bottom_mm > max {
            max = self.bottom_mm;
        }
        if self.left_mm > max {
            max = self.left_mm;
        }
        max
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(DEFAULT_MARGIN_MM)
    }
}

/// Fixed layout options applied to every paginated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    /// Paper size
    pub page_size: PageSize,

    /// Margins on all four sides
    pub margins: Margins,

    /// Character encoding of the intermediate document
    pub encoding: String,

    /// Extra HTTP headers the engine sends when loading resources
    pub custom_headers: Vec<(String, String)>,

    /// Whether the engine may read local files (needed for local images)
    pub enable_local_file_access: bool,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            margins: Margins::default(),
            encoding: "UTF-8".to_string(),
            custom_headers: vec![("Accept-Encoding".to_string(), "gzip".to_string())],
            enable_local_file_access: true,
        }
    }
}

/// Configuration for a batch conversion.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Directory containing the Markdown documents
    pub input_dir: PathBuf,

    /// Directory receiving the PDF files
    pub output_dir: PathBuf,

    /// Scratch directory for intermediate HTML, removed after every run
    pub temp_dir: PathBuf,

    /// Location of the wkhtmltopdf executable
    pub engine_path: PathBuf,

    /// File name pattern selecting input documents
    pub document_glob: String,

    /// Page layout handed to the engine
    pub layout: PageLayout,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use md2pdf::Config;
    ///
    /// let config = Config::builder()
    ///     .input_dir("./notes")
    ///     .output_dir("./pdf")
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Returns the default engine location for the current platform.
    #[must_use]
    pub fn default_engine_path() -> PathBuf {
        PathBuf::from(DEFAULT_ENGINE_PATH)
    }

    /// Validates the configuration.
    ///
    /// The input directory is not required to exist; a missing input
    /// directory is reported by the scanner instead.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A directory or the engine path is empty
    /// - The temp directory collides with the input or output directory
    /// - The document glob is invalid
    /// - A margin is out of range
    pub fn validate(&self) -> Result<()> {
        for (name, path) in [
            ("input_dir", &self.input_dir),
            ("output_dir", &self.output_dir),
            ("temp_dir", &self.temp_dir),
            ("engine_path", &self.engine_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(Error::config(format!("{name} must not be empty")));
            }
        }

        // The temp directory is deleted recursively at the end of a run
        if same_location(&self.temp_dir, &self.output_dir) {
            return Err(Error::config(format!(
                "temp_dir must differ from output_dir: {}",
                self.temp_dir.display()
            )));
        }

        if same_location(&self.temp_dir, &self.input_dir) {
            return Err(Error::config(format!(
                "temp_dir must differ from input_dir: {}",
                self.temp_dir.display()
            )));
        }

        Glob::new(&self.document_glob).map_err(|e| {
            Error::config(format!(
                "Invalid document glob '{}': {}",
                self.document_glob, e
            ))
        })?;

        if self.layout.encoding.trim().is_empty() {
            return Err(Error::config("encoding must not be empty"));
        }

        let largest = self.layout.margins.largest();
        if largest > MAX_MARGIN_MM {
            return Err(Error::config(format!(
                "margins must be at most {MAX_MARGIN_MM}mm, got {largest}mm"
            )));
        }

        Ok(())
    }

    /// Returns the PDF path for an input document stem.
    #[must_use]
    pub fn output_path(&self, stem: &str) -> PathBuf {
        self.output_dir.join(format!("{stem}.pdf"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            temp_dir: PathBuf::from(DEFAULT_TEMP_DIR),
            engine_path: Config::default_engine_path(),
            document_glob: DEFAULT_DOCUMENT_GLOB.to_string(),
            layout: PageLayout::default(),
        }
    }
}

/// Compares two paths, resolving them when they exist.
fn same_location(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    temp_dir: Option<PathBuf>,
    engine_path: Option<PathBuf>,
    document_glob: Option<String>,
    layout: Option<PageLayout>,
}

impl ConfigBuilder {
    /// Sets the directory containing Markdown documents.
    #[must_use]
    pub fn input_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_dir = Some(path.into());
        self
    }

    /// Sets the output directory for PDF files.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Sets the scratch directory for intermediate HTML.
    #[must_use]
    pub fn temp_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(path.into());
        self
    }

    /// Sets the location of the wkhtmltopdf executable.
    #[must_use]
    pub fn engine_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.engine_path = Some(path.into());
        self
    }

    /// Sets the file name pattern for input documents.
    #[must_use]
    pub fn document_glob(mut self, pattern: impl Into<String>) -> Self {
        self.document_glob = Some(pattern.into());
        self
    }

    /// Sets the page layout.
    #[must_use]
    pub fn layout(mut self, layout: PageLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let config = Config {
            input_dir: self
                .input_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_DIR)),
            output_dir: self
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            temp_dir: self
                .temp_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMP_DIR)),
            engine_path: self.engine_path.unwrap_or_else(Config::default_engine_path),
            document_glob: self
                .document_glob
                .unwrap_or_else(|| DEFAULT_DOCUMENT_GLOB.to_string()),
            layout: self.layout.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}
