//! Markdown rendering.
//!
//! Parses a document with a fixed extension set (tables, fenced code,
//! highlighting hooks, table of contents, metadata headers, hard line breaks)
//! and produces the HTML body that the document template wraps.

use crate::highlight::highlight;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::trace;

const TOC_MARKER: &str = "[TOC]";

/// Metadata header values keyed by lower-cased name.
pub type Metadata = BTreeMap<String, Vec<String>>;

/// One heading of the rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    /// Heading level, 1 to 6
    pub level: u8,

    /// Anchor assigned to the heading
    pub id: String,

    /// Plain heading text
    pub text: String,
}

/// Output of [`MarkupRenderer::render`].
#[derive(Debug, Clone, Default)]
pub struct RenderedMarkup {
    /// HTML body
    pub body: String,

    /// Metadata header, empty when the document has none
    pub metadata: Metadata,

    /// Headings in document order
    pub toc: Vec<TocEntry>,
}

impl RenderedMarkup {
    /// Title from the `title` metadata key, falling back to the first heading.
    #[must_use]
    pub fn title(&self) -> Option<String> {
        self.metadata
            .get("title")
            .map(|values| values.join(" "))
            .filter(|title| !title.trim().is_empty())
            .or_else(|| self.toc.first().map(|entry| entry.text.clone()))
    }
}

/// Converts Markdown text to an HTML body.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupRenderer;

impl MarkupRenderer {
    /// Creates a renderer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    const fn options() -> Options {
        Options::ENABLE_TABLES
    }

    /// Renders one document.
    ///
    /// When `base_dir` is given, relative image and link targets are
    /// rewritten to absolute `file://` URLs under it. Fragment-only links
    /// are left alone so they keep pointing into the same document.
    #[must_use]
    pub fn render(&self, source: &str, base_dir: Option<&Path>) -> RenderedMarkup {
        let (metadata, body_source) = split_metadata(source);
        if !metadata.is_empty() {
            trace!("Metadata keys: {:?}", metadata.keys().collect::<Vec<_>>());
        }

        let mut events: Vec<Event<'_>> = Vec::new();
        let mut toc = Vec::new();
        let mut used_ids = HashSet::new();
        let mut toc_markers = Vec::new();

        let mut heading: Option<(usize, String)> = None;
        let mut paragraph_start: Option<usize> = None;
        let mut code: Option<(Option<String>, String)> = None;

        for event in Parser::new_ext(body_source, Self::options()) {
            if let Some((_, buffer)) = code.as_mut() {
                match event {
                    Event::Text(text) => buffer.push_str(&text),
                    Event::End(TagEnd::CodeBlock) => {
                        if let Some((language, buffer)) = code.take() {
                            let block = render_code_block(language.as_deref(), &buffer);
                            events.push(Event::Html(CowStr::from(block)));
                        }
                    }
                    _ => {}
                }
                continue;
            }

            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let language = match kind {
                        CodeBlockKind::Fenced(info) => code_language(&info),
                        CodeBlockKind::Indented => None,
                    };
                    code = Some((language, String::new()));
                }
                Event::Start(Tag::Heading { .. }) => {
                    heading = Some((events.len(), String::new()));
                    events.push(event);
                }
                Event::End(TagEnd::Heading(level)) => {
                    if let Some((start, text)) = heading.take() {
                        let id = unique_id(&slugify(&text), &mut used_ids);
                        if let Event::Start(Tag::Heading { id: slot, .. }) = &mut events[start] {
                            *slot = Some(CowStr::from(id.clone()));
                        }
                        toc.push(TocEntry {
                            level: level as u8,
                            id,
                            text: text.trim().to_string(),
                        });
                    }
                    events.push(event);
                }
                Event::Start(Tag::Paragraph) => {
                    paragraph_start = Some(events.len());
                    events.push(event);
                }
                Event::End(TagEnd::Paragraph) => {
                    let start = paragraph_start.take();
                    match start {
                        Some(start) if is_toc_marker(&events[start + 1..]) => {
                            events.truncate(start);
                            toc_markers.push(events.len());
                            events.push(Event::Html(CowStr::Borrowed("")));
                        }
                        _ => events.push(event),
                    }
                }
                Event::Text(ref text) | Event::Code(ref text) => {
                    if let Some((_, buffer)) = heading.as_mut() {
                        buffer.push_str(text);
                    }
                    events.push(event);
                }
                Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => events.push(Event::Start(Tag::Image {
                    link_type,
                    dest_url: rebase(dest_url, base_dir),
                    title,
                    id,
                })),
                Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => events.push(Event::Start(Tag::Link {
                    link_type,
                    dest_url: rebase(dest_url, base_dir),
                    title,
                    id,
                })),
                Event::SoftBreak => events.push(Event::HardBreak),
                other => events.push(other),
            }
        }

        if !toc_markers.is_empty() {
            let toc_html = render_toc(&toc);
            for index in toc_markers {
                events[index] = Event::Html(CowStr::from(toc_html.clone()));
            }
        }

        let mut body = String::with_capacity(body_source.len() * 3 / 2);
        html::push_html(&mut body, events.into_iter());

        RenderedMarkup {
            body,
            metadata,
            toc,
        }
    }
}

/// Splits a leading `Key: value` header block from the document.
///
/// The block may be opened by `---` and ends at a blank line, `---` or `...`.
/// Lines indented by four or more spaces continue the previous key. When the
/// first line is not a header the document is returned unchanged.
fn split_metadata(source: &str) -> (Metadata, &str) {
    let mut metadata = Metadata::new();
    let mut current_key: Option<String> = None;
    let mut offset = 0;
    let mut consumed = 0;

    for (index, raw_line) in source.split_inclusive('\n').enumerate() {
        let line = raw_line.trim_end_matches(['\n', '\r']);
        offset += raw_line.len();

        if index == 0 && is_fence(line, '-') {
            consumed = offset;
            continue;
        }

        if line.trim().is_empty() || is_fence(line, '-') || is_fence(line, '.') {
            consumed = offset;
            break;
        }

        if let Some((key, value)) = metadata_line(line) {
            metadata.entry(key.clone()).or_default().push(value.to_string());
            current_key = Some(key);
            consumed = offset;
            continue;
        }

        match (&current_key, line.strip_prefix("    ")) {
            (Some(key), Some(more)) => {
                if let Some(values) = metadata.get_mut(key) {
                    values.push(more.trim().to_string());
                }
                consumed = offset;
            }
            _ => break,
        }
    }

    if metadata.is_empty() {
        return (metadata, source);
    }

    (metadata, &source[consumed..])
}

fn is_fence(line: &str, ch: char) -> bool {
    let head: String = line.chars().take(3).collect();
    head.len() == 3
        && head.chars().all(|c| c == ch)
        && line[3..].chars().next().is_none_or(char::is_whitespace)
}

fn metadata_line(line: &str) -> Option<(String, &str)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let (key, value) = line[indent..].split_once(':')?;
    let valid_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid_key.then(|| (key.to_ascii_lowercase(), value.trim()))
}

fn is_toc_marker(events: &[Event<'_>]) -> bool {
    let mut text = String::new();
    for event in events {
        match event {
            Event::Text(t) => text.push_str(t),
            _ => return false,
        }
    }
    text.trim() == TOC_MARKER
}

/// Returns the first word of a fence info string, limited to safe class characters.
fn code_language(info: &str) -> Option<String> {
    let language: String = info
        .split_whitespace()
        .next()?
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '#'))
        .collect();
    (!language.is_empty()).then_some(language)
}

fn render_code_block(language: Option<&str>, code: &str) -> String {
    let language = language.map(str::to_ascii_lowercase);
    let class = language
        .as_deref()
        .map_or_else(String::new, |lang| format!(" class=\"language-{lang}\""));
    format!(
        "<div class=\"codehilite\"><pre><code{class}>{}</code></pre></div>\n",
        highlight(language.as_deref(), code)
    )
}

/// Points a relative URL at `base_dir`; anything with a scheme, a fragment
/// or a protocol-relative host is returned unchanged.
fn rebase<'a>(url: CowStr<'a>, base_dir: Option<&Path>) -> CowStr<'a> {
    let Some(base_dir) = base_dir else {
        return url;
    };
    if url.is_empty() || url.starts_with('#') || url.starts_with("//") || has_scheme(&url) {
        return url;
    }

    let rebased = if url.starts_with('/') {
        format!("file://{}", url.replace(' ', "%20"))
    } else if is_drive_path(&url) {
        file_url(Path::new(&*url))
    } else {
        format!("{}/{}", file_url(base_dir), url.replace(' ', "%20"))
    };
    CowStr::from(rebased)
}

fn has_scheme(url: &str) -> bool {
    url.split_once(':').is_some_and(|(scheme, _)| {
        scheme.len() > 1
            && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

fn is_drive_path(url: &str) -> bool {
    let bytes = url.as_bytes();
    bytes.len() > 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && matches!(bytes[2], b'/' | b'\\')
}

/// Builds a `file://` URL for an absolute path, without a trailing slash.
pub(crate) fn file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    // Windows verbatim prefix left by canonicalize
    let raw = raw.strip_prefix("//?/").unwrap_or(&raw);
    let raw = raw.trim_end_matches('/');

    let mut url = String::from("file://");
    if !raw.starts_with('/') {
        url.push('/');
    }
    for ch in raw.chars() {
        match ch {
            ' ' => url.push_str("%20"),
            '"' => url.push_str("%22"),
            '#' => url.push_str("%23"),
            '%' => url.push_str("%25"),
            '<' => url.push_str("%3C"),
            '>' => url.push_str("%3E"),
            '?' => url.push_str("%3F"),
            _ => url.push(ch),
        }
    }
    url
}

fn render_toc(entries: &[TocEntry]) -> String {
    let mut out = String::from("<div class=\"toc\">\n");
    let mut open_levels: Vec<u8> = Vec::new();

    for entry in entries {
        match open_levels.last().copied() {
            None => {
                out.push_str("<ul>\n");
                open_levels.push(entry.level);
            }
            Some(current) if entry.level > current => {
                out.push_str("\n<ul>\n");
                open_levels.push(entry.level);
            }
            Some(_) => {
                out.push_str("</li>\n");
                while open_levels.len() > 1
                    && open_levels.last().is_some_and(|&level| entry.level < level)
                {
                    open_levels.pop();
                    out.push_str("</ul>\n</li>\n");
                }
            }
        }
        out.push_str(&format!(
            "<li><a href=\"#{}\">{}</a>",
            entry.id,
            escape_html(&entry.text)
        ));
    }

    if !open_levels.is_empty() {
        out.push_str("</li>\n");
        while open_levels.len() > 1 {
            open_levels.pop();
            out.push_str("</ul>\n</li>\n");
        }
        out.push_str("</ul>\n");
    }

    out.push_str("</div>\n");
    out
}

/// Lower-cased anchor text: letters and digits kept, whitespace and dashes
/// collapsed to `-`, other punctuation dropped.
fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for ch in text.trim().chars() {
        if ch.is_alphanumeric() || ch == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else if ch.is_whitespace() || ch == '-' {
            pending_dash = true;
        }
    }

    slug
}

fn unique_id(slug: &str, used: &mut HashSet<String>) -> String {
    let base = if slug.is_empty() { "section" } else { slug };
    let mut id = base.to_string();
    let mut n = 1;
    while used.contains(&id) {
        id = format!("{base}_{n}");
        n += 1;
    }
    used.insert(id.clone());
    id
}

pub(crate) fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(source: &str) -> RenderedMarkup {
        MarkupRenderer::new().render(source, None)
    }

    #[test]
    fn test_renders_table() {
        let rendered = render("| Name | Size |\n|------|------|\n| a.md | 12 |\n");

        assert!(rendered.body.contains("<table>"));
        assert!(rendered.body.contains("<th>Name</th>"));
        assert!(rendered.body.contains("<td>a.md</td>"));
    }

    #[test]
    fn test_fenced_code_block_is_highlight_ready() {
        let rendered = render("```Rust\nfn main() { if a < b {} }\n```\n");

        assert!(rendered.body.contains("<div class=\"codehilite\"><pre><code class=\"language-rust\">"));
        assert!(rendered.body.contains("<span class=\"source rust\">"));
        assert!(rendered.body.contains("&lt;"));
        assert!(!rendered.body.contains("a < b"));
        assert!(!rendered.body.contains("<br />"));
    }

    #[test]
    fn test_indented_code_block() {
        let rendered = render("Intro\n\n    let x = 1;\n");

        assert!(rendered.body.contains("<div class=\"codehilite\"><pre><code>"));
        assert!(rendered.body.contains("let x = 1;"));
    }

    #[test]
    fn test_soft_breaks_become_line_breaks() {
        let rendered = render("first line\nsecond line\n");

        assert!(rendered.body.contains("first line<br />"));
        assert!(rendered.body.contains("second line"));
    }

    #[test]
    fn test_headings_get_unique_ids() {
        let rendered = render("# Hello, World!\n\n## Setup\n\n## Setup\n");

        assert!(rendered.body.contains("<h1 id=\"hello-world\">"));
        assert!(rendered.body.contains("<h2 id=\"setup\">"));
        assert!(rendered.body.contains("<h2 id=\"setup_1\">"));
        assert_eq!(rendered.toc.len(), 3);
        assert_eq!(rendered.toc[0].level, 1);
        assert_eq!(rendered.toc[0].text, "Hello, World!");
    }

    #[test]
    fn test_unicode_heading_keeps_letters() {
        let rendered = render("# 安装 指南\n");

        assert_eq!(rendered.toc[0].id, "安装-指南");
    }

    #[test]
    fn test_toc_marker_is_replaced() {
        let rendered = render("[TOC]\n\n# Intro\n\n## Details\n\n# End\n");

        assert!(rendered.body.contains("<div class=\"toc\">"));
        assert!(rendered.body.contains("<a href=\"#intro\">Intro</a>"));
        assert!(rendered.body.contains("<a href=\"#details\">Details</a>"));
        assert!(!rendered.body.contains("[TOC]"));
        assert_eq!(
            rendered.body.matches("<ul>").count(),
            rendered.body.matches("</ul>").count()
        );
    }

    #[test]
    fn test_toc_marker_inside_code_is_kept() {
        let rendered = render("```\n[TOC]\n```\n\n# Title\n");

        assert!(rendered.body.contains("[TOC]"));
        assert!(!rendered.body.contains("class=\"toc\""));
    }

    #[test]
    fn test_metadata_header_is_stripped() {
        let source = "Title: Release Notes\nAuthors: Ann\n    Bo\n\n# Changes\n";
        let rendered = render(source);

        assert_eq!(rendered.metadata["title"], vec!["Release Notes"]);
        assert_eq!(rendered.metadata["authors"], vec!["Ann", "Bo"]);
        assert!(!rendered.body.contains("Release Notes"));
        assert_eq!(rendered.title().as_deref(), Some("Release Notes"));
    }

    #[test]
    fn test_metadata_with_fences() {
        let rendered = render("---\ntitle: Fenced\n---\nBody text\n");

        assert_eq!(rendered.metadata["title"], vec!["Fenced"]);
        assert!(rendered.body.contains("<p>Body text</p>"));
    }

    #[test]
    fn test_document_without_metadata_is_untouched() {
        let rendered = render("# Plain\n\nText: with a colon\n");

        assert!(rendered.metadata.is_empty());
        assert_eq!(rendered.title().as_deref(), Some("Plain"));
        assert!(rendered.body.contains("Text: with a colon"));
    }

    #[test]
    fn test_local_image_reference() {
        let rendered = render("![diagram](images/flow.png)\n");

        assert!(rendered.body.contains("<img src=\"images/flow.png\" alt=\"diagram\""));
    }

    #[test]
    fn test_relative_targets_point_at_base_dir() {
        let rendered = MarkupRenderer::new().render(
            "![diagram](images/flow.png)\n\n[next](<part two.md>) [site](https://example.com) [mail](mailto:a@b.c)\n",
            Some(Path::new("/data/my notes")),
        );

        assert!(rendered.body.contains("<img src=\"file:///data/my%20notes/images/flow.png\""));
        assert!(rendered.body.contains("href=\"file:///data/my%20notes/part%20two.md\""));
        assert!(rendered.body.contains("href=\"https://example.com\""));
        assert!(rendered.body.contains("href=\"mailto:a@b.c\""));
    }

    #[test]
    fn test_fragment_links_stay_in_document() {
        let rendered = MarkupRenderer::new().render(
            "[TOC]\n\n# Intro\n\nSee [below](#intro).\n",
            Some(Path::new("/data/md")),
        );

        assert!(rendered.body.contains("<a href=\"#intro\">Intro</a>"));
        assert!(rendered.body.contains("<a href=\"#intro\">below</a>"));
        assert!(!rendered.body.contains("file://"));
    }

    #[test]
    fn test_absolute_image_paths() {
        let base = Some(Path::new("/data/md"));
        let unix = MarkupRenderer::new().render("![a](/srv/img/a.png)\n", base);
        let windows = MarkupRenderer::new().render("![b](C:\\pics\\b.png)\n", base);

        assert!(unix.body.contains("src=\"file:///srv/img/a.png\""));
        assert!(windows.body.contains("src=\"file:///C:/pics/b.png\""));
    }

    #[test]
    fn test_file_url_windows_style() {
        assert_eq!(
            file_url(Path::new(r"\\?\C:\Users\me\md")),
            "file:///C:/Users/me/md"
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Getting -- Started  "), "getting-started");
        assert_eq!(slugify("C++ & Rust"), "c-rust");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}
