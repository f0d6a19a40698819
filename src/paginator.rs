//! Pagination engines.
//!
//! A [`Paginator`] lays an intermediate HTML document out into pages and
//! writes the final PDF. [`Wkhtmltopdf`] drives the external `wkhtmltopdf`
//! executable; tests substitute their own implementations.

use crate::{
    config::PageLayout,
    error::{Error, Result},
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, trace};

/// Capability to turn an HTML file into a paginated document.
pub trait Paginator {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Checks that the engine can be used at all.
    ///
    /// Called once before any conversion starts; an error here stops the batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is unavailable.
    fn ensure_available(&self) -> Result<()> {
        Ok(())
    }

    /// Paginates `html` into `output`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails for this document.
    fn paginate(&self, html: &Path, output: &Path) -> Result<()>;
}

/// The `wkhtmltopdf` command-line engine.
#[derive(Debug, Clone)]
pub struct Wkhtmltopdf {
    executable: PathBuf,
    layout: PageLayout,
}

impl Wkhtmltopdf {
    /// Creates an engine wrapper for the executable at `executable`.
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>, layout: PageLayout) -> Self {
        Self {
            executable: executable.into(),
            layout,
        }
    }

    /// Builds the option list passed before the input and output paths.
    fn layout_args(&self) -> Vec<OsString> {
        let layout = &self.layout;
        let margins = layout.margins;

        let mut args: Vec<OsString> = vec![
            "--quiet".into(),
            "--encoding".into(),
            layout.encoding.clone().into(),
            "--page-size".into(),
            layout.page_size.as_str().into(),
            "--margin-top".into(),
            format!("{}mm", margins.top_mm).into(),
            "--margin-right".into(),
            format!("{}mm", margins.right_mm).into(),
            "--margin-bottom".into(),
            format!("{}mm", margins.bottom_mm).into(),
            "--margin-left".into(),
            format!("{}mm", margins.left_mm).into(),
        ];

        if layout.enable_local_file_access {
            args.push("--enable-local-file-access".into());
        }

        for (name, value) in &layout.custom_headers {
            args.push("--custom-header".into());
            args.push(name.into());
            args.push(value.into());
        }

        args
    }
}

impl Paginator for Wkhtmltopdf {
    fn name(&self) -> &str {
        "wkhtmltopdf"
    }

    fn ensure_available(&self) -> Result<()> {
        if self.executable.is_file() {
            debug!("Using wkhtmltopdf at {}", self.executable.display());
            Ok(())
        } else {
            Err(Error::engine_not_found(&self.executable))
        }
    }

    fn paginate(&self, html: &Path, output: &Path) -> Result<()> {
        let args = self.layout_args();
        trace!("{} {:?} {} {}", self.executable.display(), args, html.display(), output.display());

        let result = Command::new(&self.executable)
            .args(&args)
            .arg(html)
            .arg(output)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                Error::paginate(
                    html,
                    format!("failed to run {}: {}", self.executable.display(), e),
                )
            })?;

        if result.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&result.stderr);
        let detail = stderr.trim();
        let message = if detail.is_empty() {
            format!("wkhtmltopdf exited with {}", result.status)
        } else {
            format!("wkhtmltopdf exited with {}: {}", result.status, detail)
        };

        Err(Error::paginate(html, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Margins, PageSize};

    fn engine(path: impl Into<PathBuf>) -> Wkhtmltopdf {
        Wkhtmltopdf::new(path, PageLayout::default())
    }

    fn args_as_strings(engine: &Wkhtmltopdf) -> Vec<String> {
        engine
            .layout_args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_default_layout_args() {
        let args = args_as_strings(&engine("wkhtmltopdf"));

        assert_eq!(
            args,
            vec![
                "--quiet",
                "--encoding",
                "UTF-8",
                "--page-size",
                "A4",
                "--margin-top",
                "20mm",
                "--margin-right",
                "20mm",
                "--margin-bottom",
                "20mm",
                "--margin-left",
                "20mm",
                "--enable-local-file-access",
                "--custom-header",
                "Accept-Encoding",
                "gzip",
            ]
        );
    }

    #[test]
    fn test_custom_layout_args() {
        let layout = PageLayout {
            page_size: PageSize::Letter,
            margins: Margins {
                top_mm: 10,
                ..Margins::uniform(15)
            },
            enable_local_file_access: false,
            custom_headers: Vec::new(),
            ..PageLayout::default()
        };
        let args = args_as_strings(&Wkhtmltopdf::new("wkhtmltopdf", layout));

        assert!(args.windows(2).any(|w| w == ["--page-size", "Letter"]));
        assert!(args.windows(2).any(|w| w == ["--margin-top", "10mm"]));
        assert!(args.windows(2).any(|w| w == ["--margin-left", "15mm"]));
        assert!(!args.contains(&"--enable-local-file-access".to_string()));
        assert!(!args.contains(&"--custom-header".to_string()));
    }

    #[test]
    fn test_missing_executable_is_reported() {
        let temp = assert_fs::TempDir::new().unwrap();
        let err = engine(temp.path().join("wkhtmltopdf"))
            .ensure_available()
            .unwrap_err();

        assert!(matches!(err, Error::EngineNotFound { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_directory_is_not_an_executable() {
        let temp = assert_fs::TempDir::new().unwrap();
        assert!(engine(temp.path()).ensure_available().is_err());
    }

    #[test]
    fn test_spawn_failure_is_per_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let err = engine(temp.path().join("missing-engine"))
            .paginate(&temp.path().join("a.html"), &temp.path().join("a.pdf"))
            .unwrap_err();

        assert!(matches!(err, Error::Paginate { .. }));
        assert!(!err.is_fatal());
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_engine_receives_paths_last() {
        let temp = assert_fs::TempDir::new().unwrap();
        let exe = script(
            temp.path(),
            "fake-engine",
            r#"for last; do :; done; printf '%%PDF-1.4 fake' > "$last""#,
        );
        let html = temp.path().join("doc.html");
        let pdf = temp.path().join("doc.pdf");
        std::fs::write(&html, "<html></html>").unwrap();

        let engine = engine(&exe);
        engine.ensure_available().unwrap();
        engine.paginate(&html, &pdf).unwrap();

        let written = std::fs::read_to_string(&pdf).unwrap();
        assert!(written.starts_with("%PDF"));
    }

    #[cfg(unix)]
    #[test]
    fn test_engine_failure_carries_stderr() {
        let temp = assert_fs::TempDir::new().unwrap();
        let exe = script(temp.path(), "failing-engine", "echo 'Exit with code 1' >&2; exit 1");

        let err = engine(&exe)
            .paginate(&temp.path().join("a.html"), &temp.path().join("a.pdf"))
            .unwrap_err();

        assert!(matches!(err, Error::Paginate { .. }));
        assert!(err.to_string().contains("Exit with code 1"));
    }
}
