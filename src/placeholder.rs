//! The placeholder protocol shared by extraction and rendering.
//!
//! Extraction cannot know how an image will be rendered (or whether it will
//! survive fetching at all), so it leaves a token in the body text at the
//! image's position. Rendering later swaps each token for the resolved
//! snippet. Both phases go through this module; nothing else knows the format.
//!
//! A token is `U+FFFC media-ref:<url> U+FFFC`. U+FFFC (OBJECT REPLACEMENT
//! CHARACTER) does not occur in prose and is not whitespace, so tokens survive
//! line trimming and cannot be forged by article text.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Delimiter on both sides of a token.
pub const DELIMITER: char = '\u{FFFC}';

/// Tag between the opening delimiter and the URL.
pub const TAG: &str = "media-ref:";

static RE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{FFFC}media-ref:([^\u{FFFC}\n]+)\u{FFFC}").unwrap());

/// Build the token standing in for the image at `url`.
pub fn token(url: &str) -> String {
    format!("{DELIMITER}{TAG}{url}{DELIMITER}")
}

/// Whether `url` can be carried inside a token without ambiguity.
pub fn is_encodable(url: &str) -> bool {
    !url.is_empty() && !url.contains(DELIMITER) && !url.contains('\n')
}

/// Source URLs of every token in `text`, in order of appearance (duplicates kept).
pub fn urls(text: &str) -> Vec<&str> {
    RE_TOKEN
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

/// Replace every token with `f(url)`.
pub fn substitute<F>(text: &str, mut f: F) -> String
where
    F: FnMut(&str) -> String,
{
    RE_TOKEN
        .replace_all(text, |caps: &Captures<'_>| f(&caps[1]))
        .into_owned()
}

/// Whether any token remains in `text`.
pub fn contains_token(text: &str) -> bool {
    RE_TOKEN.is_match(text)
}
