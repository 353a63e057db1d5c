//! Body text normalisation.
//!
//! Runs after placeholders have been substituted. Paragraph structure is
//! re-derived from image positions rather than kept from the source markup:
//! extraction leaves one line per block, this module flattens those lines
//! and opens a paragraph break around every image.
//!
//! ## Rule Order
//!
//! 1. Collapse each run of newlines to a single `\n`
//! 2. Surround every image snippet with a paragraph break
//! 3. Localise ASCII punctuation (outside URLs and snippets)
//! 4. Collapse 3+ consecutive newlines down to 2
//! 5. Trim the whole text
//!
//! Each rule is a pure `&str → String` function, tested on its own.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

/// Apply all rules in order.
///
/// `blocks` are the exact image snippets (and missing-image marker, if any)
/// that occur in `text`. They are broken out into their own paragraphs and
/// never touched by punctuation localisation.
pub fn normalize_body(text: &str, blocks: &[&str], localize: bool) -> String {
    let s = collapse_newlines(text);
    let s = break_around_blocks(&s, blocks);
    let s = if localize {
        localize_punctuation(&s, blocks)
    } else {
        s
    };
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Rule 1: Flatten newline runs ─────────────────────────────────────────────

static RE_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());

fn collapse_newlines(input: &str) -> String {
    let s = input.replace("\r\n", "\n").replace('\r', "\n");
    RE_NEWLINES.replace_all(&s, "\n").into_owned()
}

// ── Rule 2: Paragraph breaks around images ───────────────────────────────────

fn break_around_blocks(input: &str, blocks: &[&str]) -> String {
    let spans = find_spans(input, blocks.iter().copied(), &[]);
    if spans.is_empty() {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len() + spans.len() * 4);
    let mut last = 0;
    for span in spans {
        out.push_str(&input[last..span.start]);
        out.push_str("\n\n");
        out.push_str(&input[span.clone()]);
        out.push_str("\n\n");
        last = span.end;
    }
    out.push_str(&input[last..]);
    out
}

// ── Rule 3: Punctuation localisation ─────────────────────────────────────────

static RE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[a-z][a-z0-9+.\-]*://[!-~]+").unwrap());

/// Full-width counterpart of a localisable ASCII punctuation character.
fn full_width(c: char) -> Option<char> {
    Some(match c {
        ',' => '，',
        '.' => '。',
        '!' => '！',
        '?' => '？',
        ':' => '：',
        ';' => '；',
        '(' => '（',
        ')' => '）',
        '[' => '【',
        ']' => '】',
        _ => return None,
    })
}

/// Replace ASCII punctuation with full-width equivalents.
///
/// A character is left alone when ASCII alphanumerics sit on both sides of
/// it (`file.txt`, `3.14`, `a:b`). URLs and the `protected` substrings are
/// copied verbatim.
pub fn localize_punctuation(input: &str, protected: &[&str]) -> String {
    let urls: Vec<Range<usize>> = RE_URL.find_iter(input).map(|m| m.range()).collect();
    let spans = find_spans(input, protected.iter().copied(), &urls);

    let mut out = String::with_capacity(input.len() + input.len() / 4);
    let mut last = 0;
    for span in spans {
        localize_segment(&input[last..span.start], &mut out);
        out.push_str(&input[span.clone()]);
        last = span.end;
    }
    localize_segment(&input[last..], &mut out);
    out
}

fn localize_segment(segment: &str, out: &mut String) {
    let chars: Vec<char> = segment.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        let Some(wide) = full_width(c) else {
            out.push(c);
            continue;
        };
        let before = i.checked_sub(1).map(|j| chars[j]);
        let after = chars.get(i + 1).copied();
        let guarded = matches!((before, after), (Some(b), Some(a))
            if b.is_ascii_alphanumeric() && a.is_ascii_alphanumeric());
        out.push(if guarded { c } else { wide });
    }
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}

// ── Span helpers ─────────────────────────────────────────────────────────────

/// Non-overlapping byte ranges of every occurrence of `needles` plus the
/// pre-computed `extra` ranges, sorted; earlier and longer spans win.
fn find_spans<'a>(
    input: &str,
    needles: impl Iterator<Item = &'a str>,
    extra: &[Range<usize>],
) -> Vec<Range<usize>> {
    let mut all: Vec<Range<usize>> = extra.to_vec();
    for needle in needles.filter(|n| !n.is_empty()) {
        all.extend(
            input
                .match_indices(needle)
                .map(|(start, m)| start..start + m.len()),
        );
    }
    all.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(all.len());
    for r in all {
        match merged.last() {
            Some(prev) if r.start < prev.end => {}
            _ => merged.push(r),
        }
    }
    merged
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_newlines() {
        assert_eq!(collapse_newlines("a\n\n\nb\r\n\r\nc"), "a\nb\nc");
    }

    #[test]
    fn test_break_around_blocks() {
        assert_eq!(
            break_around_blocks("A\nIMG\nB", &["IMG"]),
            "A\n\n\nIMG\n\n\nB"
        );
        assert_eq!(break_around_blocks("no images", &["IMG"]), "no images");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb\n\nc"), "a\n\nb\n\nc");
    }

    #[test]
    fn localizes_prose_punctuation() {
        assert_eq!(localize_punctuation("hello, world.", &[]), "hello， world。");
        assert_eq!(
            localize_punctuation("真的吗?(是的)[注]", &[]),
            "真的吗？（是的）【注】"
        );
    }

    #[test]
    fn leaves_url_untouched() {
        assert_eq!(
            localize_punctuation("see http://a.com/x.y.z", &[]),
            "see http://a.com/x.y.z"
        );
        assert_eq!(
            localize_punctuation("链接:https://a.com/p?q=1,2。", &[]),
            "链接：https://a.com/p?q=1,2。"
        );
    }

    #[test]
    fn url_glued_to_cjk_text_is_protected() {
        assert_eq!(
            localize_punctuation("见https://a.com/x.y", &[]),
            "见https://a.com/x.y"
        );
    }

    #[test]
    fn guards_letter_flanked_characters() {
        assert_eq!(localize_punctuation("open file.txt now", &[]), "open file.txt now");
        assert_eq!(localize_punctuation("pi is 3.14", &[]), "pi is 3.14");
        assert_eq!(localize_punctuation("end.", &[]), "end。");
    }

    #[test]
    fn protected_snippets_survive() {
        let snippet = "![a (b)](images/0abc.jpg)";
        let text = format!("x, {snippet} y.");
        assert_eq!(
            localize_punctuation(&text, &[snippet]),
            format!("x， {snippet} y。")
        );
    }

    #[test]
    fn full_normalization_example() {
        let snippet = "![](images/u1.jpg)";
        let text = format!("A\n\n\n{snippet}\n\nB");
        assert_eq!(
            normalize_body(&text, &[snippet], true),
            format!("A\n\n{snippet}\n\nB")
        );
    }

    #[test]
    fn lines_without_images_stay_single_spaced() {
        assert_eq!(normalize_body("one\n\n\ntwo\n", &[], false), "one\ntwo");
    }

    #[test]
    fn adjacent_images_get_one_break_between() {
        let a = "![](images/a.jpg)";
        let b = "![](images/b.jpg)";
        let text = format!("{a}\n{b}");
        assert_eq!(normalize_body(&text, &[a, b], true), format!("{a}\n\n{b}"));
    }

    #[test]
    fn overlapping_spans_merge() {
        let spans = find_spans("abcdef", ["bcd", "cde"].into_iter(), &[0..2]);
        assert_eq!(spans, vec![0..2, 2..5]);
    }
}
