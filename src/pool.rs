//! Thread-local parser pooling.
//!
//! Every edit triggers a full reparse, so parser construction would otherwise
//! dominate small edits. One parser per grammar is created lazily per thread
//! and reused for every subsequent parse.

use crate::ts::{Grammar, LanguageParser, TreeSitterError};
use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static PARSERS: RefCell<HashMap<Grammar, LanguageParser>> = RefCell::new(HashMap::new());
}

/// Execute function with the pooled parser for `grammar`.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use treemorph::pool::with_parser;
/// use treemorph::ts::Grammar;
///
/// let _tree = with_parser(Grammar::TypeScript, |parser| parser.parse_syntax("let a = 1;"))??;
/// # Ok(())
/// # }
/// ```
pub fn with_parser<F, R>(grammar: Grammar, f: F) -> Result<R, TreeSitterError>
where
    F: FnOnce(&mut LanguageParser) -> R,
{
    PARSERS.with(|cell| {
        let mut parsers = cell.borrow_mut();
        let parser = match parsers.entry(grammar) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                log::debug!("creating pooled {} parser", grammar.name());
                entry.insert(LanguageParser::new(grammar)?)
            }
        };
        Ok(f(parser))
    })
}

/// Number of parsers pooled on this thread.
pub fn pooled_count() -> usize {
    PARSERS.with(|cell| cell.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_is_reused_per_grammar() {
        with_parser(Grammar::Rust, |p| p.parse_syntax("fn a() {}").map(|_| ()))
            .unwrap()
            .unwrap();
        let after_first = pooled_count();
        with_parser(Grammar::Rust, |p| p.parse_syntax("fn b() {}").map(|_| ()))
            .unwrap()
            .unwrap();
        assert_eq!(pooled_count(), after_first);

        let grammar = with_parser(Grammar::JavaScript, |p| p.grammar()).unwrap();
        assert_eq!(grammar, Grammar::JavaScript);
    }
}
