//! Section codec: read and rewrite `%NAME_BEG% … %NAME_END%` blocks inside a
//! free-text description without touching anything around them.
//!
//! A description may hold any mix of human-written text and machine-written
//! sections:
//!
//! ```text
//! Grandma's birthday, 1987
//!
//! %OCR_BEG%
//! happy birthday
//! %OCR_END%
//! %TAG_BEG%
//! family, party%TAG_END%
//! ```
//!
//! ## Matching rules
//!
//! * Markers are matched non-greedily across newlines, and only the **first**
//!   pair of a given name is read or replaced. Duplicate pairs of the same name
//!   are not supported; what happens to the second pair is undefined.
//! * [`update_text`] writes non-empty content on its own lines between the
//!   markers and collapses an empty payload to adjacent markers. An empty
//!   section and an absent one are therefore indistinguishable once written:
//!   after any update, callers cannot recover "never had a section".
//! * When the section is missing it is appended after the trailing-trimmed
//!   description, separated by a blank line.

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use std::fmt;

/// A named section kind that can live in a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// Free-text payload holding recognised text.
    Ocr,
    /// Comma-separated tag list.
    Tag,
}

static RE_OCR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)%OCR_BEG%(.*?)%OCR_END%").unwrap());

static RE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)%TAG_BEG%(.*?)%TAG_END%").unwrap());

/// Any marker token of any section name.
static RE_ANY_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%[A-Z][A-Z0-9]*_(?:BEG|END)%").unwrap());

impl Section {
    /// Marker name, e.g. `"OCR"`.
    pub fn name(self) -> &'static str {
        match self {
            Section::Ocr => "OCR",
            Section::Tag => "TAG",
        }
    }

    pub fn begin_marker(self) -> String {
        format!("%{}_BEG%", self.name())
    }

    pub fn end_marker(self) -> String {
        format!("%{}_END%", self.name())
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Section::Ocr => &RE_OCR,
            Section::Tag => &RE_TAG,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Return the trimmed payload of the first `section` block, or `None` when the
/// description has no such block.
pub fn extract_text(description: &str, section: Section) -> Option<String> {
    section
        .pattern()
        .captures(description)
        .map(|caps| caps[1].trim().to_string())
}

/// Return the tag list of the first TAG block.
///
/// A present but empty block yields `Some(vec![])`, not `None`.
pub fn extract_tags(description: &str) -> Option<Vec<String>> {
    let raw = extract_text(description, Section::Tag)?;
    if raw.is_empty() {
        return Some(Vec::new());
    }
    Some(raw.split(',').map(|t| t.trim().to_string()).collect())
}

/// Replace the first `section` block with `content`, or append one.
///
/// Marker tokens inside `content` are removed first, so the written block
/// always closes at its own end marker. Idempotent: applying the same update
/// twice yields the same description.
pub fn update_text(description: &str, section: Section, content: &str) -> String {
    let content = strip_markers(content);
    let marker = if content.is_empty() {
        format!("{}{}", section.begin_marker(), section.end_marker())
    } else {
        format!(
            "{}\n{}\n{}",
            section.begin_marker(),
            content,
            section.end_marker()
        )
    };

    let re = section.pattern();
    if re.is_match(description) {
        return re.replacen(description, 1, NoExpand(&marker)).into_owned();
    }

    format!("{}\n\n{}", description.trim_end(), marker)
}

/// Replace or append the TAG block with `tags` joined by `", "`.
///
/// Commas are the list separator, so any comma inside a tag is dropped and
/// `"rock,paper"` is written as `"rockpaper"`.
pub fn update_tags<S: AsRef<str>>(description: &str, tags: &[S]) -> String {
    let joined = tags
        .iter()
        .map(|t| normalize_tag(t.as_ref()))
        .collect::<Vec<_>>()
        .join(", ");
    update_text(description, Section::Tag, &joined)
}

/// The form a tag takes once written: trimmed, with commas removed.
pub fn normalize_tag(tag: &str) -> String {
    tag.replace(',', "").trim().to_string()
}

/// Remove every `%NAME_BEG%` / `%NAME_END%` token from `text`.
///
/// Machine-produced payloads pass through this before being written so a
/// payload can never close or open a section by itself.
pub fn strip_markers(text: &str) -> String {
    RE_ANY_MARKER.replace_all(text, "").into_owned()
}
