//! Tree-sitter backed oracle.
//!
//! Grammars come from ast-grep-language; trees are flattened into owned
//! [`crate::syntax::SyntaxTree`]s so nothing outside this module touches
//! tree-sitter types.

pub mod errors;
pub mod oracle;
pub mod parser;
pub mod pattern;
mod scope;

pub use errors::TreeSitterError;
pub use oracle::TreeSitterOracle;
pub use parser::{Grammar, LanguageParser};
pub use pattern::{find_pattern, PatternHit};
