//! Post-processing: deterministic cleanup of recognised text.
//!
//! The recogniser is a chat model, so its output occasionally carries
//! artefacts a classic OCR engine never would: code fences, "No text found"
//! sentences, zero-width characters. The text ends up inside a single OCR
//! section of a human-edited description, so it is also flattened onto one
//! line and scrubbed of anything that looks like a section marker.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised so the fence regex
//! sees the raw output; markers are removed before whitespace is collapsed so
//! a removed marker never leaves a double space behind.

use crate::sections;
use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to the raw recogniser output.
///
/// Rules (applied in order):
/// 1. Strip outer code fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Turn "no text found" style answers into an empty string
/// 5. Remove `%NAME_BEG%` / `%NAME_END%` tokens
/// 6. Collapse all whitespace runs to a single space and trim
/// 7. Lowercase, when requested
pub fn clean_text(input: &str, lowercase: bool) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    if is_no_text_answer(&s) {
        return String::new();
    }
    let s = sections::strip_markers(&s);
    let s = collapse_whitespace(&s);
    if lowercase {
        s.to_lowercase()
    } else {
        s
    }
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\n(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Detect "no text" answers ─────────────────────────────────────────
//
// The prompt asks for empty output when nothing is readable, but models often
// answer with a sentence instead. Only whole-answer matches count, so a photo
// of a sign reading "no text" mid-sentence is kept.

static RE_NO_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^[\s\(\[]*(?:there is )?no (?:readable |visible |legible )?text(?: (?:found|detected|visible|present))?(?: in (?:the|this) (?:image|photo))?[\s\.\)\]]*$",
    )
    .unwrap()
});

fn is_no_text_answer(input: &str) -> bool {
    RE_NO_TEXT.is_match(input.trim())
}

// ── Rule 6: Collapse whitespace ──────────────────────────────────────────────

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Tests ────────────────────────────────────────────────────────────────────
