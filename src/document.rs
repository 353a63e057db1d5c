//! Data passed between the pipeline stages.

use crate::placeholder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A fetched article page, not yet parsed.
#[derive(Debug, Clone)]
pub struct RawPage {
    /// Final URL of the page; relative image sources are resolved against it.
    pub url: String,
    /// Page markup, decoded as UTF-8.
    pub text: String,
    /// Charset declared by the server, if any. Informational only.
    pub encoding: Option<String>,
}

impl RawPage {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
            encoding: None,
        }
    }
}

/// An image found in the article body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub source_url: String,
    pub alt_text: String,
}

/// Structured extraction result.
///
/// `body` carries one placeholder token per image position; `media_refs`
/// lists each distinct source URL once, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDocument {
    pub title: String,
    pub author: String,
    /// May be empty.
    pub summary: String,
    pub body: String,
    pub media_refs: Vec<MediaRef>,
}

impl ArticleDocument {
    /// Check that placeholders in `body` and `media_refs` name the same URLs.
    pub fn placeholders_consistent(&self) -> bool {
        let in_body: HashSet<&str> = placeholder::urls(&self.body).into_iter().collect();
        let in_refs: HashSet<&str> = self
            .media_refs
            .iter()
            .map(|r| r.source_url.as_str())
            .collect();
        in_refs.len() == self.media_refs.len() && in_body == in_refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: String, urls: &[&str]) -> ArticleDocument {
        ArticleDocument {
            title: "T".into(),
            author: "A".into(),
            summary: String::new(),
            body,
            media_refs: urls
                .iter()
                .map(|u| MediaRef {
                    source_url: u.to_string(),
                    alt_text: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn consistent_when_sets_match() {
        let body = format!("{}\nx\n{}", placeholder::token("u1"), placeholder::token("u1"));
        assert!(doc(body, &["u1"]).placeholders_consistent());
    }

    #[test]
    fn orphan_placeholder_is_inconsistent() {
        let body = placeholder::token("u2");
        assert!(!doc(body, &["u1"]).placeholders_consistent());
    }

    #[test]
    fn duplicate_ref_is_inconsistent() {
        let body = placeholder::token("u1");
        assert!(!doc(body, &["u1", "u1"]).placeholders_consistent());
    }
}
