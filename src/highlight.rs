//! Syntax highlighting for code blocks.
//!
//! Code is tokenized with syntect and emitted as class-annotated spans; the
//! matching stylesheet is generated once from a bundled light theme and
//! embedded in the document template.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use syntect::highlighting::ThemeSet;
use syntect::html::{ClassStyle, ClassedHTMLGenerator, css_for_theme_with_class_style};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use tracing::warn;

const THEME: &str = "InspiredGitHub";
const CLASS_STYLE: ClassStyle = ClassStyle::Spaced;

static SYNTAXES: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

/// Returns the CSS rules for the token classes produced by [`highlight`].
///
/// # Errors
///
/// Returns an error if the bundled theme is missing or cannot be converted.
pub(crate) fn stylesheet() -> Result<String> {
    let themes = ThemeSet::load_defaults();
    let theme = themes
        .themes
        .get(THEME)
        .ok_or_else(|| Error::highlight(format!("theme '{THEME}' is not bundled")))?;

    css_for_theme_with_class_style(theme, CLASS_STYLE).map_err(|e| Error::highlight(e.to_string()))
}

/// Tokenizes `code` and returns escaped HTML with class-annotated spans.
///
/// Unknown or missing languages are emitted as plain text.
pub(crate) fn highlight(language: Option<&str>, code: &str) -> String {
    let syntaxes = &*SYNTAXES;
    let syntax = language
        .and_then(|lang| syntaxes.find_syntax_by_token(lang))
        .unwrap_or_else(|| syntaxes.find_syntax_plain_text());

    let mut generator = ClassedHTMLGenerator::new_with_class_style(syntax, syntaxes, CLASS_STYLE);
    for line in LinesWithEndings::from(code) {
        if let Err(e) = generator.parse_html_for_line_which_includes_newline(line) {
            warn!("Highlighting {} failed: {}", syntax.name, e);
            return crate::markup::escape_html(code);
        }
    }
    generator.finalize()
}
