//! Syntax guard for edits.
//!
//! After an edit the new text is reparsed anyway; when the project is set to
//! reject syntax errors, the new tree is compared against the old one and the
//! edit is refused if it introduced ERROR or MISSING nodes. Errors already
//! present before the edit and untouched by it are tolerated.

use crate::edit::ChangeDescriptor;
use crate::syntax::SyntaxTree;
use std::collections::HashSet;
use std::ops::Range;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Parse error introduced in {path}: found {count} new ERROR nodes")]
    ParseErrorIntroduced {
        path: PathBuf,
        count: usize,
        errors: Vec<ErrorLocation>,
    },
}

/// Location of an error node in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLocation {
    pub byte_start: usize,
    pub byte_end: usize,
    pub line: usize,
    pub column: usize,
    pub context: String,
}

impl ErrorLocation {
    fn new(source: &str, range: Range<usize>) -> Self {
        let before = &source[..range.start];
        let line = before.matches('\n').count() + 1;
        let column = before.len() - before.rfind('\n').map_or(0, |nl| nl + 1) + 1;

        // Up to 20 bytes either side.
        let context_start = floor_char_boundary(source, range.start.saturating_sub(20));
        let context_end = ceil_char_boundary(source, (range.end + 20).min(source.len()));
        let context = source[context_start..context_end].replace('\n', "\\n");

        Self {
            byte_start: range.start,
            byte_end: range.end,
            line,
            column,
            context,
        }
    }
}

/// All error nodes of `tree`.
pub fn collect_errors(tree: &SyntaxTree, source: &str) -> Vec<ErrorLocation> {
    tree.error_ranges()
        .into_iter()
        .map(|range| ErrorLocation::new(source, range))
        .collect()
}

/// Refuse `new_tree` if it has error nodes that `old_tree` did not.
///
/// Old errors are mapped through `change` first: errors before the edit keep
/// their offsets, errors after it shift by the delta, errors touching the
/// invalidated range are dropped so they count as new if they persist.
pub fn check_edit(
    path: PathBuf,
    old_tree: &SyntaxTree,
    new_tree: &SyntaxTree,
    new_text: &str,
    change: &ChangeDescriptor,
) -> Result<(), ValidationError> {
    if !new_tree.has_errors() {
        return Ok(());
    }

    let known: HashSet<(usize, usize)> = old_tree
        .error_ranges()
        .into_iter()
        .filter_map(|range| rebase(range, change))
        .collect();

    let new_errors: Vec<_> = new_tree
        .error_ranges()
        .into_iter()
        .filter(|range| !known.contains(&(range.start, range.end)))
        .map(|range| ErrorLocation::new(new_text, range))
        .collect();

    if new_errors.is_empty() {
        return Ok(());
    }

    log::debug!("{} new parse errors in {}", new_errors.len(), path.display());
    Err(ValidationError::ParseErrorIntroduced {
        path,
        count: new_errors.len(),
        errors: new_errors,
    })
}

fn rebase(range: Range<usize>, change: &ChangeDescriptor) -> Option<(usize, usize)> {
    let invalid = &change.invalidated;
    if range.end < invalid.start {
        Some((range.start, range.end))
    } else if range.start > invalid.end {
        Some((change.shift(range.start), change.shift(range.end)))
    } else {
        None
    }
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::{apply_edit, EditRequest};
    use crate::ts::{Grammar, LanguageParser};

    fn parse(source: &str) -> SyntaxTree {
        LanguageParser::new(Grammar::Rust)
            .unwrap()
            .parse_syntax(source)
            .unwrap()
    }

    #[test]
    fn clean_edit_passes() {
        let old = "fn main() { let x = 1; }";
        let change = apply_edit(old, &EditRequest::replace(20, 21, "2")).unwrap();
        let result = check_edit(
            PathBuf::from("a.rs"),
            &parse(old),
            &parse(&change.new_text),
            &change.new_text,
            &change.descriptor,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn introduced_error_is_reported_with_position() {
        let old = "fn main() {\n    let x = 1;\n}";
        let start = old.find("1;").unwrap();
        let change = apply_edit(old, &EditRequest::replace(start, start + 2, "1 +;")).unwrap();
        let err = check_edit(
            PathBuf::from("a.rs"),
            &parse(old),
            &parse(&change.new_text),
            &change.new_text,
            &change.descriptor,
        )
        .unwrap_err();

        let ValidationError::ParseErrorIntroduced { count, errors, .. } = err;
        assert!(count > 0);
        assert_eq!(errors[0].line, 2);
    }

    #[test]
    fn preexisting_error_before_edit_is_tolerated() {
        let old = "fn b() { let = 1; }\nfn a() {}\n";
        let a = old.rfind('a').unwrap();
        let change = apply_edit(old, &EditRequest::replace(a, a + 1, "zz")).unwrap();
        let result = check_edit(
            PathBuf::from("a.rs"),
            &parse(old),
            &parse(&change.new_text),
            &change.new_text,
            &change.descriptor,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn line_and_column_are_one_based() {
        let loc = ErrorLocation::new("ab\ncd", 4..5);
        assert_eq!((loc.line, loc.column), (2, 2));
        assert_eq!(loc.context, "ab\\ncd");
    }
}
