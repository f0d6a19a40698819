use crate::{
    error::{Error, Result},
    highlight,
    markup::RenderedMarkup,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tera::{Context, Tera};

const DOCUMENT_TEMPLATE: &str = "document.html";

#[derive(Serialize)]
struct TemplateContext<'a> {
    title: &'a str,
    body: &'a str,
    highlight_css: &'a str,
    metadata: BTreeMap<&'a str, String>,
    generated_at: String,
}

/// Wraps rendered Markdown in the fixed, styled HTML document.
pub(crate) struct TemplateEngine {
    tera: Tera,
    highlight_css: String,
}

impl TemplateEngine {
    /// Creates a new template engine with the built-in document template.
    ///
    /// # Errors
    ///
    /// Returns an error if the template fails to parse or the highlighting
    /// stylesheet cannot be generated.
    pub(crate) fn new() -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_template(
            DOCUMENT_TEMPLATE,
            include_str!("../templates/document.html.tera"),
        )
        .map_err(|e| Error::template(DOCUMENT_TEMPLATE, &e))?;

        Ok(Self {
            tera,
            highlight_css: highlight::stylesheet()?,
        })
    }

    /// Renders a complete HTML document.
    ///
    /// `fallback_title` is used when the document has neither a `title`
    /// metadata key nor a heading.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub(crate) fn render(&self, markup: &RenderedMarkup, fallback_title: &str) -> Result<String> {
        let title = markup.title().unwrap_or_else(|| fallback_title.to_string());

        let metadata = markup
            .metadata
            .iter()
            .filter(|(key, _)| key.as_str() != "title")
            .map(|(key, values)| (key.as_str(), values.join(" ")))
            .collect();

        let context = TemplateContext {
            title: &title,
            body: &markup.body,
            highlight_css: &self.highlight_css,
            metadata,
            generated_at: chrono::Local::now()
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        };

        let mut tera_context = Context::new();
        tera_context.insert("ctx", &context);

        self.tera
            .render(DOCUMENT_TEMPLATE, &tera_context)
            .map_err(|e| Error::template(DOCUMENT_TEMPLATE, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::MarkupRenderer;
    use std::path::Path;

    fn render(source: &str) -> String {
        render_in(source, None)
    }

    fn render_in(source: &str, base_dir: Option<&Path>) -> String {
        let engine = TemplateEngine::new().unwrap();
        let markup = MarkupRenderer::new().render(source, base_dir);
        engine.render(&markup, "fallback").unwrap()
    }

    #[test]
    fn test_template_engine_creation() {
        assert!(TemplateEngine::new().is_ok());
    }

    #[test]
    fn test_document_structure() {
        let html = render("# Guide\n\nSome *text*.\n");

        assert!(html.trim_start().starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<meta charset=\"utf-8\">"));
        assert!(html.contains("<title>Guide</title>"));
        assert!(html.contains("<h1 id=\"guide\">Guide</h1>"));
        assert!(html.contains("<em>text</em>"));
        assert!(!html.contains("<base"));
    }

    #[test]
    fn test_fixed_stylesheet() {
        let html = render("text\n");

        assert!(html.contains("font-family: \"Microsoft YaHei\", Arial, sans-serif;"));
        assert!(html.contains("max-width: 21cm;"));
        assert!(html.contains("background-color: #f5f5f5;"));
        assert!(html.contains("border: 1px solid #ddd;"));
        assert!(html.contains("max-width: 100%;"));
    }

    #[test]
    fn test_fallback_title_is_escaped() {
        let engine = TemplateEngine::new().unwrap();
        let markup = MarkupRenderer::new().render("no headings here\n", None);
        let html = engine.render(&markup, "a<b").unwrap();

        assert!(html.contains("<title>a&lt;b</title>"));
    }

    #[test]
    fn test_metadata_becomes_meta_tags() {
        let html = render("Title: Report\nAuthor: Ann\n\nBody\n");

        assert!(html.contains("<title>Report</title>"));
        assert!(html.contains("<meta name=\"author\" content=\"Ann\">"));
    }

    #[test]
    fn test_toc_links_resolve_within_document() {
        let html = render_in(
            "[TOC]\n\n# Intro\n\n![x](img/a.png)\n",
            Some(Path::new("/data/my notes")),
        );

        assert!(!html.contains("<base"));
        assert!(html.contains("<a href=\"#intro\">Intro</a>"));
        assert!(html.contains("<img src=\"file:///data/my%20notes/img/a.png\""));
    }

    #[test]
    fn test_highlight_rules_are_embedded() {
        let engine = TemplateEngine::new().unwrap();
        let html = render("```rust\nfn main() {}\n```\n");

        assert!(html.contains(engine.highlight_css.trim()));
        assert!(html.contains("<span class=\"source rust\">"));
    }
}
