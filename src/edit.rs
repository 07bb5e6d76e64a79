use serde::Serialize;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// A structural edit against one document's full text.
///
/// Every high-level manipulation (rename, alias insertion, member insertion,
/// list removal) compiles down to one of these. The request is consumed by
/// [`apply_edit`] and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditRequest {
    /// Insert `text` at `position`. `structural_child_count` is how many new
    /// sibling nodes the caller expects the text to produce; it is carried
    /// through untouched for post-insert lookup.
    Insert {
        position: usize,
        text: String,
        structural_child_count: usize,
    },
    /// Replace `[start, end)` with `text`.
    ReplaceRange {
        start: usize,
        end: usize,
        text: String,
    },
    /// Remove one element of a separator-delimited list along with exactly
    /// one adjacent separator.
    RemoveListElement {
        element: Range<usize>,
        policy: SeparatorPolicy,
    },
}

impl EditRequest {
    pub fn insert(position: usize, text: impl Into<String>, structural_child_count: usize) -> Self {
        EditRequest::Insert {
            position,
            text: text.into(),
            structural_child_count,
        }
    }

    pub fn replace(start: usize, end: usize, text: impl Into<String>) -> Self {
        EditRequest::ReplaceRange {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn remove_list_element(element: Range<usize>, policy: SeparatorPolicy) -> Self {
        EditRequest::RemoveListElement { element, policy }
    }
}

/// How list separators are found around a removed element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeparatorPolicy {
    pub separator: char,
    /// Region the separator scan may not leave, usually the inside of the
    /// list's brackets. `None` scans the whole text.
    pub bounds: Option<Range<usize>>,
}

impl Default for SeparatorPolicy {
    fn default() -> Self {
        Self::comma()
    }
}

impl SeparatorPolicy {
    pub fn comma() -> Self {
        Self {
            separator: ',',
            bounds: None,
        }
    }

    pub fn within(mut self, bounds: Range<usize>) -> Self {
        self.bounds = Some(bounds);
        self
    }
}

/// What one edit did to the text, in old-text offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeDescriptor {
    /// Byte range of the old text that was replaced.
    pub invalidated: Range<usize>,
    /// `new_len - old_len`.
    pub delta: isize,
    /// Length of the text written in place of `invalidated`.
    pub inserted_len: usize,
}

impl ChangeDescriptor {
    /// The range the inserted text occupies in the new text.
    pub fn inserted_range(&self) -> Range<usize> {
        self.invalidated.start..self.invalidated.start + self.inserted_len
    }

    /// Map an old offset at or after the invalidated range into the new text.
    pub fn shift(&self, offset: usize) -> usize {
        (offset as isize + self.delta) as usize
    }
}

/// A `(start, length)` span, the unit reference lookups report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TextSpan {
    pub start: usize,
    pub length: usize,
}

impl TextSpan {
    pub fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}

impl From<Range<usize>> for TextSpan {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end - range.start)
    }
}

/// Result of running an [`EditRequest`] through the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "TextChange does nothing until it is synchronized into a document"]
pub struct TextChange {
    pub new_text: String,
    pub descriptor: ChangeDescriptor,
    pub structural_child_count: usize,
    /// The replaced slice already held the new text.
    pub unchanged: bool,
}

impl TextChange {
    /// The new text equals the old one; there is nothing to synchronize.
    pub fn is_noop(&self) -> bool {
        self.unchanged
    }
}

/// Verification strategy for the text a span is expected to hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large spans)
    Hash(u64),
}

impl EditVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }

    /// Check the span `range` of `text` (belonging to `file`).
    pub fn verify(&self, file: &Path, text: &str, range: Range<usize>) -> Result<(), EditError> {
        check_range(text, range.start, range.end)?;
        let found = &text[range.clone()];
        if self.matches(found) {
            return Ok(());
        }
        Err(EditError::BeforeTextMismatch {
            file: file.to_path_buf(),
            byte_start: range.start,
            byte_end: range.end,
            expected: match self {
                EditVerification::ExactMatch(text) => text.clone(),
                EditVerification::Hash(hash) => format!("xxh3:{hash:016x}"),
            },
            found: found.to_string(),
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("Invalid byte range: [{byte_start}, {byte_end}) in text of length {file_len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        file_len: usize,
    },

    #[error("Offset {offset} is not on a UTF-8 character boundary")]
    NotCharBoundary { offset: usize },

    #[error("List element at [{byte_start}, {byte_end}) is the only element; remove the enclosing construct instead")]
    SoleListElement { byte_start: usize, byte_end: usize },

    #[error("Before-text verification failed at {file}:{byte_start}")]
    BeforeTextMismatch {
        file: PathBuf,
        byte_start: usize,
        byte_end: usize,
        expected: String,
        found: String,
    },
}

/// Turn a request into a full-text replacement.
///
/// Nothing is mutated: the caller decides whether to commit the returned
/// text. Invalid ranges fail before any text is built.
pub fn apply_edit(text: &str, request: &EditRequest) -> Result<TextChange, EditError> {
    match request {
        EditRequest::ReplaceRange {
            start,
            end,
            text: new_text,
        } => splice(text, *start, *end, new_text, 0),
        EditRequest::Insert {
            position,
            text: new_text,
            structural_child_count,
        } => splice(text, *position, *position, new_text, *structural_child_count),
        EditRequest::RemoveListElement { element, policy } => {
            let range = list_removal_range(text, element.clone(), policy)?;
            splice(text, range.start, range.end, "", 0)
        }
    }
}

fn check_range(text: &str, start: usize, end: usize) -> Result<(), EditError> {
    if start > end || end > text.len() {
        return Err(EditError::InvalidByteRange {
            byte_start: start,
            byte_end: end,
            file_len: text.len(),
        });
    }
    for offset in [start, end] {
        if !text.is_char_boundary(offset) {
            return Err(EditError::NotCharBoundary { offset });
        }
    }
    Ok(())
}

fn splice(
    text: &str,
    start: usize,
    end: usize,
    replacement: &str,
    structural_child_count: usize,
) -> Result<TextChange, EditError> {
    check_range(text, start, end)?;

    let unchanged = &text[start..end] == replacement;
    let mut new_text = String::with_capacity(text.len() - (end - start) + replacement.len());
    new_text.push_str(&text[..start]);
    new_text.push_str(replacement);
    new_text.push_str(&text[end..]);

    Ok(TextChange {
        new_text,
        descriptor: ChangeDescriptor {
            invalidated: start..end,
            delta: replacement.len() as isize - (end - start) as isize,
            inserted_len: replacement.len(),
        },
        structural_child_count,
        unchanged,
    })
}

/// Decide which bytes go away with a list element.
///
/// A following separator is preferred (element + separator + the whitespace
/// after it). Without one, the element is the last: the preceding separator
/// and the whitespace between it and the element go instead. With neither,
/// the element is alone in its list.
fn list_removal_range(
    text: &str,
    element: Range<usize>,
    policy: &SeparatorPolicy,
) -> Result<Range<usize>, EditError> {
    check_range(text, element.start, element.end)?;
    let bounds = policy.bounds.clone().unwrap_or(0..text.len());
    check_range(text, bounds.start, bounds.end)?;
    if element.start < bounds.start || element.end > bounds.end {
        return Err(EditError::InvalidByteRange {
            byte_start: element.start,
            byte_end: element.end,
            file_len: text.len(),
        });
    }

    let sep = policy.separator;

    let after = &text[element.end..bounds.end];
    let after_trimmed = after.trim_start();
    if after_trimmed.starts_with(sep) {
        let sep_end = element.end + (after.len() - after_trimmed.len()) + sep.len_utf8();
        let rest = &text[sep_end..bounds.end];
        let trailing_ws = rest.len() - rest.trim_start().len();
        return Ok(element.start..sep_end + trailing_ws);
    }

    let before = &text[bounds.start..element.start];
    let before_trimmed = before.trim_end();
    if before_trimmed.ends_with(sep) {
        let sep_start = bounds.start + before_trimmed.len() - sep.len_utf8();
        return Ok(sep_start..element.end);
    }

    Err(EditError::SoleListElement {
        byte_start: element.start,
        byte_end: element.end,
    })
}
