//! The editing facade.
//!
//! A [`Project`] owns every document, one identity cache per document, the
//! oracle and the file-system host. All edits go through
//! [`Project::apply_edit`]: the edit engine produces the new text, the oracle
//! reparses it, the optional syntax guard inspects the result, and only then
//! is the document replaced and its handles synchronized. A failure at any
//! step leaves the project exactly as it was.

use crate::cache::{NodeCache, NodeId, NodeState};
use crate::config::Settings;
use crate::document::{Document, DocumentId, DocumentStore};
use crate::edit::{self, ChangeDescriptor, EditRequest, SeparatorPolicy};
use crate::error::{MorphError, Result};
use crate::fs::{FileSystemHost, RealFileSystem};
use crate::oracle::{Oracle, ReferenceLocation, Symbol};
use crate::rename::{self, RenameReport};
use crate::sync::{self, SyncStats};
use crate::syntax::RawId;
use crate::ts::{find_pattern, TreeSitterOracle};
use crate::validate;
use std::cell::OnceCell;
use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Result of one committed (or skipped) edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOutcome {
    pub descriptor: ChangeDescriptor,
    pub structural_child_count: usize,
    pub stats: SyncStats,
    /// The edit produced the text the document already had.
    pub unchanged: bool,
}

/// Saved state of some documents, taken before a multi-document edit.
pub(crate) struct Checkpoint {
    saved: Vec<(Document, NodeCache)>,
}

pub struct Project {
    oracle: Box<dyn Oracle>,
    fs: Box<dyn FileSystemHost>,
    settings: OnceCell<Settings>,
    store: DocumentStore,
    caches: HashMap<DocumentId, NodeCache>,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("documents", &self.store.len())
            .field("settings", &self.settings.get())
            .finish_non_exhaustive()
    }
}

impl Project {
    pub fn new(oracle: impl Oracle + 'static) -> Self {
        Self::with_file_system(oracle, RealFileSystem)
    }

    pub fn with_file_system(
        oracle: impl Oracle + 'static,
        fs: impl FileSystemHost + 'static,
    ) -> Self {
        Self {
            oracle: Box::new(oracle),
            fs: Box::new(fs),
            settings: OnceCell::new(),
            store: DocumentStore::new(),
            caches: HashMap::new(),
        }
    }

    /// A project on the real disk using the tree-sitter oracle configured by
    /// `settings`.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let project = Self::new(TreeSitterOracle::from_settings(&settings));
        project.set_settings(settings)?;
        Ok(project)
    }

    /// Install settings. Allowed once, and only before anything has read the
    /// defaults.
    pub fn set_settings(&self, settings: Settings) -> Result<()> {
        settings
            .validate()
            .map_err(|source| crate::config::ConfigError::Validation { path: None, source })?;
        self.settings
            .set(settings)
            .map_err(|_| MorphError::invalid("settings can only be set once"))
    }

    pub fn settings(&self) -> &Settings {
        self.settings.get_or_init(Settings::default)
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub(crate) fn oracle(&self) -> &dyn Oracle {
        self.oracle.as_ref()
    }

    // ---- documents -------------------------------------------------------

    /// Register `text` as the document at `path`.
    pub fn create_document(&mut self, path: impl Into<PathBuf>, text: impl Into<String>) -> Result<DocumentId> {
        let path = path.into();
        if self.store.contains_path(&path) {
            return Err(MorphError::invalid(format!(
                "a document already exists at {}",
                path.display()
            )));
        }
        let text = text.into();
        let tree = self.oracle.parse(&path, &text)?;
        log::debug!("created {} ({} bytes, {} nodes)", path.display(), text.len(), tree.len());
        let id = self.store.insert(path, text, tree);
        self.caches.insert(id, NodeCache::new(id));
        Ok(id)
    }

    /// Read `path` through the file-system host and register it. Returns the
    /// existing document if the path is already loaded.
    pub fn add_document_from_path(&mut self, path: impl AsRef<Path>) -> Result<DocumentId> {
        let path = path.as_ref();
        if let Some(id) = self.store.id_for_path(path) {
            return Ok(id);
        }
        let text = self.fs.read(path).map_err(|source| MorphError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.create_document(path, text)
    }

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.store.get(id)
    }

    pub fn document_or_err(&self, id: DocumentId) -> Result<&Document> {
        self.store
            .get(id)
            .ok_or_else(|| MorphError::not_found(format!("document {id}")))
    }

    pub fn document_by_path(&self, path: impl AsRef<Path>) -> Option<&Document> {
        self.store
            .id_for_path(path.as_ref())
            .and_then(|id| self.store.get(id))
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> + '_ {
        self.store.iter()
    }

    /// Drop a document and retire every handle into it.
    pub fn remove_document(&mut self, id: DocumentId) -> Result<Document> {
        let document = self
            .store
            .remove(id)
            .ok_or_else(|| MorphError::not_found(format!("document {id}")))?;
        self.caches.remove(&id);
        Ok(document)
    }

    pub fn save(&self, id: DocumentId) -> Result<()> {
        let document = self.document_or_err(id)?;
        self.fs
            .write(document.path(), document.text())
            .map_err(|source| MorphError::Io {
                path: document.path().to_path_buf(),
                source,
            })?;
        log::debug!("saved {}", document.path().display());
        Ok(())
    }

    pub fn save_all(&self) -> Result<()> {
        for document in self.store.iter() {
            self.save(document.id())?;
        }
        Ok(())
    }

    // ---- handles ---------------------------------------------------------

    pub fn state(&self, node: NodeId) -> NodeState {
        self.caches
            .get(&node.document())
            .map_or(NodeState::Forgotten, |cache| cache.state(node))
    }

    pub fn is_live(&self, node: NodeId) -> bool {
        self.state(node) == NodeState::Live
    }

    /// Number of live handles into `document`.
    pub fn live_handle_count(&self, document: DocumentId) -> usize {
        self.caches.get(&document).map_or(0, NodeCache::len)
    }

    fn locate(&self, node: NodeId) -> Result<(&Document, RawId)> {
        let raw = self
            .caches
            .get(&node.document())
            .and_then(|cache| cache.raw(node))
            .ok_or(MorphError::ForgottenNode { node })?;
        let document = self
            .store
            .get(node.document())
            .ok_or(MorphError::ForgottenNode { node })?;
        Ok((document, raw))
    }

    fn issue(&mut self, document: DocumentId, raws: Vec<RawId>) -> Vec<NodeId> {
        let (Some(doc), Some(cache)) = (self.store.get(document), self.caches.get_mut(&document))
        else {
            return Vec::new();
        };
        raws.into_iter()
            .map(|raw| cache.get_or_create(doc.tree(), raw))
            .collect()
    }

    fn issue_one(&mut self, document: DocumentId, raw: Option<RawId>) -> Option<NodeId> {
        raw.and_then(|raw| self.issue(document, vec![raw]).pop())
    }

    /// Copies of `documents` and their handle caches, for [`Project::restore`].
    pub(crate) fn checkpoint(&self, documents: &[DocumentId]) -> Checkpoint {
        let saved = documents
            .iter()
            .filter_map(|id| Some((self.store.get(*id)?.clone(), self.caches.get(id)?.clone())))
            .collect();
        Checkpoint { saved }
    }

    /// Put every checkpointed document and its handles back.
    pub(crate) fn restore(&mut self, checkpoint: Checkpoint) {
        for (document, cache) in checkpoint.saved {
            let id = document.id();
            if let Some(current) = self.store.get_mut(id) {
                *current = document;
            }
            if let Some(current) = self.caches.get_mut(&id) {
                current.rollback(cache);
            }
        }
    }

    // ---- navigation ------------------------------------------------------

    pub fn root(&mut self, document: DocumentId) -> Result<NodeId> {
        let root = self.document_or_err(document)?.tree().root();
        self.issue_one(document, Some(root))
            .ok_or_else(|| MorphError::not_found(format!("document {document}")))
    }

    /// The node with exactly `kind` at `range`.
    pub fn node_at(&mut self, document: DocumentId, range: Range<usize>, kind: &str) -> Result<NodeId> {
        let raw = self.document_or_err(document)?.tree().find(kind, range.clone());
        self.issue_one(document, raw).ok_or_else(|| {
            MorphError::not_found(format!("`{kind}` at {}..{} in {document}", range.start, range.end))
        })
    }

    /// The smallest node covering `offset`.
    pub fn deepest_node_at(&mut self, document: DocumentId, offset: usize) -> Result<NodeId> {
        let doc = self.document_or_err(document)?;
        if offset > doc.len() {
            return Err(edit::EditError::InvalidByteRange {
                byte_start: offset,
                byte_end: offset,
                file_len: doc.len(),
            }
            .into());
        }
        let raw = doc.tree().deepest_at(offset);
        self.issue_one(document, Some(raw))
            .ok_or_else(|| MorphError::not_found(format!("node at {offset} in {document}")))
    }

    pub fn kind(&self, node: NodeId) -> Result<&str> {
        let (doc, raw) = self.locate(node)?;
        Ok(doc.tree().get(raw).kind.as_str())
    }

    pub fn range(&self, node: NodeId) -> Result<Range<usize>> {
        let (doc, raw) = self.locate(node)?;
        Ok(doc.tree().get(raw).range())
    }

    pub fn text(&self, node: NodeId) -> Result<&str> {
        let (doc, raw) = self.locate(node)?;
        Ok(&doc.text()[doc.tree().get(raw).range()])
    }

    pub fn is_named(&self, node: NodeId) -> Result<bool> {
        let (doc, raw) = self.locate(node)?;
        Ok(doc.tree().get(raw).named)
    }

    /// Field this node occupies in its parent (`name`, `alias`, `body`, ...).
    pub fn field_name(&self, node: NodeId) -> Result<Option<&str>> {
        let (doc, raw) = self.locate(node)?;
        Ok(doc.tree().get(raw).field.as_deref())
    }

    pub fn parent(&mut self, node: NodeId) -> Result<Option<NodeId>> {
        let (doc, raw) = self.locate(node)?;
        let parent = doc.tree().get(raw).parent;
        Ok(self.issue_one(node.document(), parent))
    }

    pub fn children(&mut self, node: NodeId) -> Result<Vec<NodeId>> {
        let (doc, raw) = self.locate(node)?;
        let children = doc.tree().get(raw).children.clone();
        Ok(self.issue(node.document(), children))
    }

    pub fn named_children(&mut self, node: NodeId) -> Result<Vec<NodeId>> {
        let (doc, raw) = self.locate(node)?;
        let tree = doc.tree();
        let children = tree
            .get(raw)
            .children
            .iter()
            .copied()
            .filter(|&child| tree.get(child).named)
            .collect();
        Ok(self.issue(node.document(), children))
    }

    pub fn child_index(&self, node: NodeId) -> Result<Option<usize>> {
        let (doc, raw) = self.locate(node)?;
        Ok(doc.tree().child_index(raw))
    }

    pub fn next_sibling(&mut self, node: NodeId) -> Result<Option<NodeId>> {
        self.sibling(node, 1)
    }

    pub fn previous_sibling(&mut self, node: NodeId) -> Result<Option<NodeId>> {
        self.sibling(node, -1)
    }

    fn sibling(&mut self, node: NodeId, step: isize) -> Result<Option<NodeId>> {
        let (doc, raw) = self.locate(node)?;
        let tree = doc.tree();
        let sibling = tree.get(raw).parent.and_then(|parent| {
            let index = tree.child_index(raw)?.checked_add_signed(step)?;
            tree.get(parent).children.get(index).copied()
        });
        Ok(self.issue_one(node.document(), sibling))
    }

    /// Parent chain, nearest first.
    pub fn ancestors(&mut self, node: NodeId) -> Result<Vec<NodeId>> {
        let (doc, raw) = self.locate(node)?;
        let ancestors = doc.tree().ancestors(raw).collect();
        Ok(self.issue(node.document(), ancestors))
    }

    pub fn first_ancestor_by_kind(&mut self, node: NodeId, kind: &str) -> Result<Option<NodeId>> {
        let (doc, raw) = self.locate(node)?;
        let tree = doc.tree();
        let found = tree.ancestors(raw).find(|&id| tree.get(id).kind == kind);
        Ok(self.issue_one(node.document(), found))
    }

    pub fn child_by_field(&mut self, node: NodeId, field: &str) -> Result<Option<NodeId>> {
        let (doc, raw) = self.locate(node)?;
        let child = doc.tree().child_by_field(raw, field);
        Ok(self.issue_one(node.document(), child))
    }

    pub fn first_child_by_kind(&mut self, node: NodeId, kind: &str) -> Result<Option<NodeId>> {
        let (doc, raw) = self.locate(node)?;
        let tree = doc.tree();
        let child = tree
            .get(raw)
            .children
            .iter()
            .copied()
            .find(|&child| tree.get(child).kind == kind);
        Ok(self.issue_one(node.document(), child))
    }

    pub fn first_child_by_kind_or_err(&mut self, node: NodeId, kind: &str) -> Result<NodeId> {
        self.first_child_by_kind(node, kind)?
            .ok_or_else(|| MorphError::not_found(format!("child `{kind}` of {node}")))
    }

    pub fn first_descendant_by_kind(&mut self, node: NodeId, kind: &str) -> Result<Option<NodeId>> {
        let (doc, raw) = self.locate(node)?;
        let tree = doc.tree();
        let found = tree
            .descendants(raw)
            .into_iter()
            .find(|&id| tree.get(id).kind == kind);
        Ok(self.issue_one(node.document(), found))
    }

    pub fn first_descendant_by_kind_or_err(&mut self, node: NodeId, kind: &str) -> Result<NodeId> {
        self.first_descendant_by_kind(node, kind)?
            .ok_or_else(|| MorphError::not_found(format!("descendant `{kind}` of {node}")))
    }

    pub fn descendants_by_kind(&mut self, node: NodeId, kind: &str) -> Result<Vec<NodeId>> {
        let (doc, raw) = self.locate(node)?;
        let tree = doc.tree();
        let found = tree
            .descendants(raw)
            .into_iter()
            .filter(|&id| tree.get(id).kind == kind)
            .collect();
        Ok(self.issue(node.document(), found))
    }

    /// Nodes of `document` matching an ast-grep pattern.
    pub fn find_by_pattern(&mut self, document: DocumentId, pattern: &str) -> Result<Vec<NodeId>> {
        let doc = self.document_or_err(document)?;
        let grammar = self
            .oracle
            .grammar_for(doc.path())
            .ok_or_else(|| crate::oracle::OracleError::UnsupportedLanguage {
                path: doc.path().to_path_buf(),
            })?;
        let hits = find_pattern(doc.text(), grammar, pattern)
            .map_err(crate::oracle::OracleError::from)?;

        let tree = doc.tree();
        let raws = hits
            .iter()
            .filter_map(|hit| {
                let raw = tree.find(&hit.kind, hit.range.clone());
                if raw.is_none() {
                    log::debug!("pattern hit `{}` at {:?} has no tree node", hit.kind, hit.range);
                }
                raw
            })
            .collect();
        Ok(self.issue(document, raws))
    }

    // ---- edits -----------------------------------------------------------

    /// Apply one edit request to `document` and synchronize its handles.
    pub fn apply_edit(&mut self, document: DocumentId, request: EditRequest) -> Result<EditOutcome> {
        let validate = self.settings().reject_syntax_errors;
        self.apply_request(document, &request, validate)
    }

    pub(crate) fn apply_request(
        &mut self,
        document: DocumentId,
        request: &EditRequest,
        validate: bool,
    ) -> Result<EditOutcome> {
        let doc = self.document_or_err(document)?;
        let change = edit::apply_edit(doc.text(), request)?;
        let descriptor = change.descriptor.clone();
        let structural_child_count = change.structural_child_count;

        if change.is_noop() {
            log::debug!("{}: edit at {:?} left the text unchanged", doc.path().display(), descriptor.invalidated);
            return Ok(EditOutcome {
                descriptor,
                structural_child_count,
                stats: SyncStats::default(),
                unchanged: true,
            });
        }

        let tree = sync::reparse(self.oracle.as_ref(), doc, &change)?;
        if validate {
            validate::check_edit(
                doc.path().to_path_buf(),
                doc.tree(),
                &tree,
                &change.new_text,
                &descriptor,
            )?;
        }

        log::debug!(
            "{}: replacing {:?} (delta {})",
            doc.path().display(),
            descriptor.invalidated,
            descriptor.delta
        );
        let (Some(doc), Some(cache)) = (self.store.get_mut(document), self.caches.get_mut(&document))
        else {
            return Err(MorphError::not_found(format!("document {document}")));
        };
        let stats = sync::commit(doc, cache, change, tree);

        Ok(EditOutcome {
            descriptor,
            structural_child_count,
            stats,
            unchanged: false,
        })
    }

    pub fn replace_range(&mut self, document: DocumentId, range: Range<usize>, text: &str) -> Result<EditOutcome> {
        self.apply_edit(document, EditRequest::replace(range.start, range.end, text))
    }

    pub fn insert_text(&mut self, document: DocumentId, position: usize, text: &str) -> Result<EditOutcome> {
        self.apply_edit(document, EditRequest::insert(position, text, 0))
    }

    /// Replace the whole text of `node`. The old handle is forgotten; the
    /// node of the same kind now spanning the new text is returned, if any.
    pub fn replace_node_text(&mut self, node: NodeId, text: &str) -> Result<Option<NodeId>> {
        let (doc, raw) = self.locate(node)?;
        let target = doc.tree().get(raw);
        let (kind, range) = (target.kind.clone(), target.range());

        self.replace_range(node.document(), range.clone(), text)?;
        if self.is_live(node) {
            return Ok(Some(node));
        }
        Ok(self
            .node_at(node.document(), range.start..range.start + text.len(), &kind)
            .ok())
    }

    /// Insert `text` at `position` inside `parent` and return the
    /// `structural_child_count` children of `parent` starting at
    /// `child_index` in the new tree.
    pub fn insert_into_parent(
        &mut self,
        parent: NodeId,
        child_index: usize,
        position: usize,
        text: &str,
        structural_child_count: usize,
    ) -> Result<Vec<NodeId>> {
        let range = self.range(parent)?;
        if position < range.start || position > range.end {
            return Err(MorphError::invalid(format!(
                "position {position} is outside {parent} ({}..{})",
                range.start, range.end
            )));
        }

        self.apply_edit(
            parent.document(),
            EditRequest::insert(position, text, structural_child_count),
        )?;

        let children = self.children(parent)?;
        let end = child_index + structural_child_count;
        if end > children.len() {
            return Err(MorphError::invalid(format!(
                "expected {structural_child_count} new children at index {child_index} of {parent}, found {}",
                children.len()
            )));
        }
        Ok(children[child_index..end].to_vec())
    }

    /// Remove `node` from the separator-delimited list it sits in.
    pub fn remove_list_element(&mut self, node: NodeId) -> Result<EditOutcome> {
        let (doc, raw) = self.locate(node)?;
        let tree = doc.tree();
        let element = tree.get(raw).range();
        let parent = tree
            .get(raw)
            .parent
            .ok_or_else(|| MorphError::invalid(format!("{node} is not inside a list")))?;

        // Keep the separator scan inside the brackets.
        let container = tree.get(parent);
        let mut bounds = container.range();
        if let Some(&first) = container.children.first() {
            let first = tree.get(first);
            if !first.named && matches!(first.kind.as_str(), "{" | "(" | "[" | "<") {
                bounds.start = first.end;
            }
        }
        if let Some(&last) = container.children.last() {
            let last = tree.get(last);
            if !last.named && matches!(last.kind.as_str(), "}" | ")" | "]" | ">") {
                bounds.end = last.start;
            }
        }

        self.apply_edit(
            node.document(),
            EditRequest::remove_list_element(element, SeparatorPolicy::comma().within(bounds)),
        )
    }

    /// Delete `node`. A node alone on its lines takes those lines with it.
    pub fn remove_node(&mut self, node: NodeId) -> Result<EditOutcome> {
        let (doc, raw) = self.locate(node)?;
        let text = doc.text();
        let mut range = doc.tree().get(raw).range();

        let line_start = text[..range.start].rfind('\n').map_or(0, |nl| nl + 1);
        let line_end = text[range.end..]
            .find('\n')
            .map_or(text.len(), |nl| range.end + nl + 1);
        let blank_before = text[line_start..range.start].trim().is_empty();
        let blank_after = text[range.end..line_end].trim().is_empty();
        if blank_before && blank_after {
            range = line_start..line_end;
        }

        self.apply_edit(node.document(), EditRequest::replace(range.start, range.end, ""))
    }

    // ---- symbols ---------------------------------------------------------

    /// Symbol named by `node` (or by its `name` field).
    pub fn symbol_of(&self, node: NodeId) -> Result<Symbol> {
        let (doc, raw) = self.locate(node)?;
        let range = doc.tree().get(raw).range();
        self.oracle
            .resolve_symbol(&self.store, node.document(), range)
            .ok_or_else(|| MorphError::not_found(format!("symbol for {node}")))
    }

    /// Every location a rename of `node` would rewrite.
    pub fn rename_locations(&self, node: NodeId) -> Result<Vec<ReferenceLocation>> {
        let symbol = self.symbol_of(node)?;
        Ok(self.oracle.find_reference_locations(&self.store, &symbol))
    }

    /// Declarations of the symbol `node` names, as handles.
    pub fn declarations_of(&mut self, node: NodeId) -> Result<Vec<NodeId>> {
        let symbol = self.symbol_of(node)?;
        let declarations = self.oracle.declarations_of(&self.store, &symbol);

        let mut handles = Vec::with_capacity(declarations.len());
        for declaration in declarations {
            let Some(document) = self.store.id_for_path(&declaration.path) else {
                continue;
            };
            handles.push(self.node_at(document, declaration.range, &declaration.kind)?);
        }
        Ok(handles)
    }

    pub fn rename(&mut self, node: NodeId, new_name: &str) -> Result<RenameReport> {
        rename::rename(self, node, new_name)
    }
}
