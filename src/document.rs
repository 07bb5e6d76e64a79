//! Text store: one [`Document`] per file, each holding an immutable text
//! snapshot and the tree parsed from it.

use crate::syntax::SyntaxTree;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use xxhash_rust::xxh3::xxh3_64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u32);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc{}", self.0)
    }
}

/// Full text and identity of one source file under edit.
///
/// The text is replaced wholesale on every edit; readers holding the old
/// `Arc<str>` keep a consistent snapshot.
#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    path: PathBuf,
    text: Arc<str>,
    tree: SyntaxTree,
    version: u64,
}

impl Document {
    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Shared handle to the current snapshot.
    pub fn snapshot(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }

    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    /// Number of edits committed since the document was created.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// xxh3 of the current text.
    pub fn fingerprint(&self) -> u64 {
        xxh3_64(self.text.as_bytes())
    }

    /// Swap in a new text and its tree, returning the old tree.
    pub(crate) fn replace(&mut self, text: String, tree: SyntaxTree) -> SyntaxTree {
        self.text = Arc::from(text);
        self.version += 1;
        std::mem::replace(&mut self.tree, tree)
    }
}

/// All documents of a project, addressed by id or by path.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: BTreeMap<DocumentId, Document>,
    by_path: HashMap<PathBuf, DocumentId>,
    next_id: u32,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new document. The caller guarantees the path is not
    /// already present.
    pub(crate) fn insert(&mut self, path: PathBuf, text: String, tree: SyntaxTree) -> DocumentId {
        debug_assert!(!self.by_path.contains_key(&path), "duplicate document path");
        let id = DocumentId(self.next_id);
        self.next_id += 1;
        self.by_path.insert(path.clone(), id);
        self.documents.insert(
            id,
            Document {
                id,
                path,
                text: Arc::from(text),
                tree,
                version: 0,
            },
        );
        id
    }

    pub(crate) fn remove(&mut self, id: DocumentId) -> Option<Document> {
        let document = self.documents.remove(&id)?;
        self.by_path.remove(&document.path);
        Some(document)
    }

    pub fn get(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: DocumentId) -> Option<&mut Document> {
        self.documents.get_mut(&id)
    }

    pub fn id_for_path(&self, path: &Path) -> Option<DocumentId> {
        self.by_path.get(path).copied()
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }

    /// Documents in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Document> + '_ {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
