//! Structural search with ast-grep patterns.
//!
//! Hits carry the matched node's kind and byte range, which is all the
//! project needs to look the node up in its own tree and hand out a handle.

use crate::ts::errors::TreeSitterError;
use crate::ts::parser::Grammar;
use ast_grep_core::tree_sitter::StrDoc;
use ast_grep_core::{AstGrep, NodeMatch, Pattern};
use ast_grep_language::SupportLang;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

const MAX_COMPILED: usize = 256;

thread_local! {
    static COMPILED: RefCell<HashMap<(Grammar, String), Pattern>> = RefCell::new(HashMap::new());
}

/// Compile `pattern` for `grammar`, reusing this thread's earlier result.
/// The table is dropped wholesale once it holds `MAX_COMPILED` entries.
fn compiled(grammar: Grammar, pattern: &str) -> Result<Pattern, TreeSitterError> {
    COMPILED.with(|table| {
        let mut table = table.borrow_mut();
        let key = (grammar, pattern.to_string());
        if let Some(found) = table.get(&key) {
            return Ok(found.clone());
        }

        let fresh = Pattern::try_new(pattern, grammar.support_lang()).map_err(|err| {
            TreeSitterError::InvalidPattern {
                message: err.to_string(),
            }
        })?;
        if table.len() >= MAX_COMPILED {
            table.clear();
        }
        table.insert(key, fresh.clone());
        Ok(fresh)
    })
}

#[cfg(test)]
fn compiled_count() -> usize {
    COMPILED.with(|table| table.borrow().len())
}

/// One node matched by a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternHit {
    pub kind: String,
    pub range: Range<usize>,
    /// Metavariable name -> captured text
    pub captures: BTreeMap<String, String>,
}

/// Every node of `source` matching `pattern`, in document order.
///
/// `$NAME` captures one node, `$$$NAME` any number of siblings and `$_`
/// matches one node without capturing it.
pub fn find_pattern(
    source: &str,
    grammar: Grammar,
    pattern: &str,
) -> Result<Vec<PatternHit>, TreeSitterError> {
    if pattern.trim().is_empty() {
        return Err(TreeSitterError::InvalidPattern {
            message: "pattern is empty".to_string(),
        });
    }

    let matcher = compiled(grammar, pattern)?;
    let grep = AstGrep::new(source, grammar.support_lang());
    Ok(grep.root().find_all(&matcher).map(hit).collect())
}

fn hit(found: NodeMatch<StrDoc<SupportLang>>) -> PatternHit {
    let node = found.get_node();
    let captures: HashMap<String, String> = found.get_env().clone().into();
    PatternHit {
        kind: node.kind().to_string(),
        range: node.range(),
        captures: captures.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_function_with_body_capture() {
        let source = "fn helper() -> i32 { 42 }\n\nfn main() { let x = helper(); }\n";
        let hits = find_pattern(source, Grammar::Rust, "fn main() { $$$BODY }").unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, "function_item");
        assert_eq!(hits[0].range.start, source.find("fn main").unwrap());
        assert!(hits[0].captures.contains_key("BODY"));
    }

    #[test]
    fn typescript_calls_in_order() {
        let source = "foo(1);\nbar(2);\nfoo(3);\n";
        let hits = find_pattern(source, Grammar::TypeScript, "foo($A)").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(&source[hits[1].range.clone()], "foo(3)");
        assert_eq!(hits[1].captures.get("A").map(String::as_str), Some("3"));
    }

    #[test]
    fn blank_pattern_is_rejected() {
        let result = find_pattern("let a = 1;", Grammar::TypeScript, "  ");
        assert!(matches!(result, Err(TreeSitterError::InvalidPattern { .. })));
    }

    #[test]
    fn compiled_patterns_are_reused() {
        find_pattern("fn a() {}", Grammar::Rust, "fn $N() {}").unwrap();
        let before = compiled_count();
        find_pattern("fn b() {}", Grammar::Rust, "fn $N() {}").unwrap();
        assert_eq!(compiled_count(), before);
    }
}
