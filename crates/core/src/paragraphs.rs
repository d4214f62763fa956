//! Paragraph reconstruction from raw line fragments.
//!
//! Paginated viewers and PDF text layers hand back one string per visual
//! line. [`reconstruct_paragraphs`] merges those fragments back into
//! speakable paragraphs: blank lines flush, a trailing hyphen glues a word
//! split across lines, and sentence-final punctuation closes a paragraph
//! early so a heading or short line does not get swallowed by the text
//! below it.
//!
//! The pass never drops a non-empty fragment: every fragment is merged
//! into an emitted paragraph or flushed at end of input. It is idempotent
//! on paragraph lists whose paragraphs end in sentence-final punctuation
//! (upstream punctuation repair guarantees that shape); a paragraph that
//! was flushed by a blank line alone carries no terminator and would merge
//! into its successor on a second pass.

use std::sync::LazyLock;

use regex::Regex;

/// Hyphen-newline sequences inside a single fragment (PDF soft wraps).
static LINE_BREAK_HYPHEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-\r?\n").unwrap());

/// Characters that close a sentence and therefore a paragraph.
const SENTENCE_FINAL: &[char] = &['.', '!', '?', ':', ')', '"', '\'', '\u{2019}', '\u{201d}'];

/// Merges raw line fragments into paragraphs.
///
/// # Example
///
/// ```rust
/// use recito_core::paragraphs::reconstruct_paragraphs;
///
/// let lines = ["Hello wor-", "ld.", "", "Next."].map(String::from);
/// assert_eq!(reconstruct_paragraphs(&lines), vec!["Hello world.", "Next."]);
/// ```
pub fn reconstruct_paragraphs(lines: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut para = String::new();

    for line in lines {
        if line.is_empty() {
            if !para.is_empty() {
                out.push(std::mem::take(&mut para));
            }
            continue;
        }
        if !para.is_empty() {
            if para.ends_with('-') {
                para.pop();
            } else {
                para.push(' ');
            }
        }
        para.push_str(&LINE_BREAK_HYPHEN.replace_all(line, ""));
        if line.ends_with(SENTENCE_FINAL) {
            out.push(std::mem::take(&mut para));
        }
    }
    if !para.is_empty() {
        out.push(para);
    }
    out
}
