//! Treemorph: structural source editing with live node handles
//!
//! Callers restructure parsed source files (insert, replace and remove
//! syntactic constructs, rename a symbol across many files) while holding
//! [`NodeId`] handles that stay consistent with the continuously reparsed
//! syntax tree.
//!
//! # Architecture
//!
//! Every manipulation compiles down to one [`EditRequest`], which the pure
//! edit engine turns into a full-text replacement plus a
//! [`ChangeDescriptor`]. The [`Project`] then reparses the new text through
//! the [`Oracle`], optionally refuses edits that introduce parse errors, and
//! synchronizes the identity cache: handles untouched by the edit are
//! rebound to their new positions, handles the edit cut through are
//! forgotten.
//!
//! # Guarantees
//!
//! - An edit either commits completely or leaves the project untouched
//! - At most one live handle per `(document, kind, range)`
//! - Forgotten handles stay forgotten; every operation rejects them
//! - Renames verify every span before the first write
//! - Atomic file writes (tempfile + fsync + rename)
//!
//! # Example
//!
//! ```no_run
//! use treemorph::{Project, TreeSitterOracle};
//!
//! # fn main() -> Result<(), treemorph::MorphError> {
//! let mut project = Project::new(TreeSitterOracle::new());
//! let doc = project.add_document_from_path("src/shapes.ts")?;
//! let root = project.root(doc)?;
//! let decl = project.first_descendant_by_kind_or_err(root, "interface_declaration")?;
//! project.rename(decl, "Polygon")?;
//! project.save_all()?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod document;
pub mod edit;
pub mod error;
pub mod fs;
pub mod manipulation;
pub mod oracle;
pub mod pool;
pub mod project;
pub mod rename;
pub mod sync;
pub mod syntax;
pub mod ts;
pub mod validate;

// Re-exports
pub use cache::{NodeId, NodeState};
pub use config::{load_from_path, load_from_str, ConfigError, NewlineKind, Settings};
pub use document::{Document, DocumentId, DocumentStore};
pub use edit::{
    apply_edit, ChangeDescriptor, EditError, EditRequest, EditVerification, SeparatorPolicy,
    TextChange, TextSpan,
};
pub use error::MorphError;
pub use fs::{FileSystemHost, InMemoryFileSystem, RealFileSystem};
pub use manipulation::SpecifierKind;
pub use oracle::{
    DeclarationLocation, Oracle, OracleError, ReferenceLocation, Symbol, SymbolOrigin, SymbolScope,
};
pub use project::{EditOutcome, Project};
pub use rename::{RenameBatch, RenameReport, RenameSite, RenamedFile};
pub use sync::SyncStats;
pub use syntax::{RawId, RawNode, SyntaxTree};
pub use ts::{Grammar, TreeSitterError, TreeSitterOracle};
pub use validate::{ErrorLocation, ValidationError};
