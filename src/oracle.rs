//! The parser / symbol-resolution service the core consumes as a black box.
//!
//! The core only ever asks an [`Oracle`] four things: parse a text, resolve
//! the symbol at a range, list every reference location of a symbol, and list
//! its declarations. [`crate::ts::TreeSitterOracle`] is the implementation
//! shipped with the crate.

use crate::document::{DocumentId, DocumentStore};
use crate::edit::TextSpan;
use crate::syntax::SyntaxTree;
use crate::ts::{Grammar, TreeSitterError};
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Namespace a symbol lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolOrigin {
    /// Bound in a scope of a file.
    Local,
    /// Names something outside the file: the imported name in
    /// `import { a as b }`, or the exported name in `export { a as b }`.
    Foreign,
    /// A property, method or field name.
    Member,
}

/// Where a symbol is bound.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolScope {
    pub path: PathBuf,
    /// Kind of the scope node, which tells nested nodes with equal ranges apart.
    pub kind: String,
    /// Byte range of the binding scope, or of the specifier for names on
    /// the far side of an alias.
    pub range: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub name: String,
    pub origin: SymbolOrigin,
    /// `None` for member names, which are matched by spelling alone.
    pub scope: Option<SymbolScope>,
}

impl Symbol {
    pub fn member(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: SymbolOrigin::Member,
            scope: None,
        }
    }
}

/// One textual occurrence that a rename must rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceLocation {
    pub path: PathBuf,
    pub span: TextSpan,
    /// Written in front of the new name, e.g. `x: ` so that the shorthand
    /// property `{ x }` becomes `{ x: renamed }`.
    pub prefix: Option<String>,
}

/// A construct that declares a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationLocation {
    pub path: PathBuf,
    pub kind: String,
    pub range: Range<usize>,
}

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("no grammar registered for {path}")]
    UnsupportedLanguage { path: PathBuf },

    #[error(transparent)]
    TreeSitter(#[from] TreeSitterError),
}

pub trait Oracle {
    /// Parse the full text of the file at `path`.
    fn parse(&self, path: &Path, text: &str) -> Result<SyntaxTree, OracleError>;

    /// Resolve the symbol named by the node at `range` in `document`.
    fn resolve_symbol(
        &self,
        store: &DocumentStore,
        document: DocumentId,
        range: Range<usize>,
    ) -> Option<Symbol>;

    /// Grammar used for files at `path`.
    fn grammar_for(&self, path: &Path) -> Option<Grammar> {
        Grammar::from_path(path)
    }

    /// Every location, across all documents in `store`, that refers to
    /// `symbol`.
    fn find_reference_locations(&self, store: &DocumentStore, symbol: &Symbol)
        -> Vec<ReferenceLocation>;

    /// Declarations of `symbol` across all documents in `store`.
    fn declarations_of(&self, store: &DocumentStore, symbol: &Symbol) -> Vec<DeclarationLocation>;
}
