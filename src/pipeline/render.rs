//! Document rendering: [`ArticleDocument`] + resolved media → Markdown.
//!
//! The header block is fixed: title as a level-1 heading, author, capture
//! time, and the summary as a block quote when present. The body has its
//! placeholders substituted and then goes through
//! [`crate::pipeline::normalize::normalize_body`].

use crate::config::ArchiveConfig;
use crate::document::ArticleDocument;
use crate::pipeline::media::ResolvedMedia;
use crate::pipeline::normalize;
use crate::placeholder;
use chrono::NaiveDateTime;
use std::collections::HashMap;

/// Timestamp format used in the header and front-matter.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Rendering switches, usually taken from [`ArchiveConfig`].
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub localize_punctuation: bool,
    /// Substituted for placeholders whose image was not resolved. `None` → empty.
    pub missing_image_marker: Option<String>,
    pub include_metadata: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            localize_punctuation: true,
            missing_image_marker: None,
            include_metadata: false,
        }
    }
}

impl From<&ArchiveConfig> for RenderOptions {
    fn from(config: &ArchiveConfig) -> Self {
        Self {
            localize_punctuation: config.localize_punctuation,
            missing_image_marker: config.missing_image_marker.clone(),
            include_metadata: config.include_metadata,
        }
    }
}

/// Render the final document.
pub fn render(
    doc: &ArticleDocument,
    resolved: &HashMap<String, ResolvedMedia>,
    fetched_at: NaiveDateTime,
    options: &RenderOptions,
) -> String {
    let mut out = String::new();
    if options.include_metadata {
        out.push_str(&front_matter(doc, resolved, fetched_at));
    }
    out.push_str(&render_header(doc, fetched_at));

    let body = render_body(&doc.body, resolved, options);
    if !body.is_empty() {
        out.push_str(&body);
        out.push('\n');
    }
    out
}

/// Title, author, capture time and summary, followed by a blank line.
pub fn render_header(doc: &ArticleDocument, fetched_at: NaiveDateTime) -> String {
    let mut header = format!(
        "# {}\n\n*Author: {}*\n\n*Captured: {}*\n\n",
        doc.title,
        doc.author,
        fetched_at.format(TIMESTAMP_FORMAT)
    );
    let summary = doc.summary.trim();
    if !summary.is_empty() {
        for line in summary.lines() {
            header.push_str("> ");
            header.push_str(line.trim_end());
            header.push('\n');
        }
        header.push('\n');
    }
    header
}

/// Substitute placeholders and normalise the body text.
pub fn render_body(
    body: &str,
    resolved: &HashMap<String, ResolvedMedia>,
    options: &RenderOptions,
) -> String {
    let marker = options
        .missing_image_marker
        .as_deref()
        .map(single_line)
        .unwrap_or_default();
    let marker = marker.as_str();

    let mut blocks: Vec<&str> = Vec::new();
    for url in placeholder::urls(body) {
        let block = resolved
            .get(url)
            .map(|m| m.rendered_snippet.as_str())
            .unwrap_or(marker);
        if !block.is_empty() && !blocks.contains(&block) {
            blocks.push(block);
        }
    }

    let substituted = placeholder::substitute(body, |url| match resolved.get(url) {
        Some(media) => media.rendered_snippet.clone(),
        None => marker.to_string(),
    });

    normalize::normalize_body(&substituted, &blocks, options.localize_punctuation)
}

/// Join the non-blank lines of `text` with spaces.
///
/// A multi-line block would be split by newline flattening and then no
/// longer match itself in `normalize_body`'s block list.
fn single_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn front_matter(
    doc: &ArticleDocument,
    resolved: &HashMap<String, ResolvedMedia>,
    fetched_at: NaiveDateTime,
) -> String {
    let mut yaml = String::from("---\n");
    yaml.push_str(&format!("title: \"{}\"\n", yaml_escape(&doc.title)));
    yaml.push_str(&format!("author: \"{}\"\n", yaml_escape(&doc.author)));
    if !doc.summary.is_empty() {
        yaml.push_str(&format!("summary: \"{}\"\n", yaml_escape(&doc.summary)));
    }
    yaml.push_str(&format!(
        "captured: \"{}\"\n",
        fetched_at.format(TIMESTAMP_FORMAT)
    ));
    yaml.push_str(&format!(
        "images: {}/{}\n",
        resolved.len(),
        doc.media_refs.len()
    ));
    yaml.push_str("---\n\n");
    yaml
}

fn yaml_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
