//! Node identity cache.
//!
//! Maps `(kind, start, end)` positions in a document's current tree to the
//! handles issued for them. This is the only place handles are created or
//! retired: a handle is live exactly while its entry is here, and serials
//! are never reused, so a retired handle can never come back to life.

use crate::document::DocumentId;
use crate::syntax::{RawId, SyntaxTree};
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

/// Handle to a node of a document's tree.
///
/// Cheap to copy and compare; two lookups of the same live position yield
/// equal handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    document: DocumentId,
    serial: u64,
}

impl NodeId {
    pub fn document(self) -> DocumentId {
        self.document
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}@{}", self.serial, self.document)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Live,
    /// Retired by an edit. Terminal.
    Forgotten,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub kind: String,
    pub start: usize,
    pub end: usize,
}

impl NodeKey {
    pub fn new(kind: impl Into<String>, range: Range<usize>) -> Self {
        Self {
            kind: kind.into(),
            start: range.start,
            end: range.end,
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

#[derive(Debug, Clone)]
struct Entry {
    key: NodeKey,
    raw: RawId,
}

/// A live handle as seen by the synchronizer.
#[derive(Debug, Clone)]
pub struct LiveHandle {
    pub id: NodeId,
    pub key: NodeKey,
    pub raw: RawId,
}

/// Per-document arena of live handles.
#[derive(Debug, Clone)]
pub struct NodeCache {
    document: DocumentId,
    next_serial: u64,
    live: HashMap<u64, Entry>,
    by_key: HashMap<NodeKey, u64>,
}

impl NodeCache {
    pub fn new(document: DocumentId) -> Self {
        Self {
            document,
            next_serial: 0,
            live: HashMap::new(),
            by_key: HashMap::new(),
        }
    }

    pub fn document(&self) -> DocumentId {
        self.document
    }

    /// Handle for `raw` in `tree`, creating it on first access.
    pub fn get_or_create(&mut self, tree: &SyntaxTree, raw: RawId) -> NodeId {
        let node = tree.get(raw);
        let key = NodeKey::new(node.kind.clone(), node.range());
        if let Some(&serial) = self.by_key.get(&key) {
            return self.id(serial);
        }

        let serial = self.next_serial;
        self.next_serial += 1;
        self.by_key.insert(key.clone(), serial);
        self.live.insert(serial, Entry { key, raw });
        self.id(serial)
    }

    /// Handle for the node with exactly `kind` and `range`, if the tree has one.
    pub fn find(&mut self, tree: &SyntaxTree, kind: &str, range: Range<usize>) -> Option<NodeId> {
        let raw = tree.find(kind, range)?;
        Some(self.get_or_create(tree, raw))
    }

    pub fn state(&self, id: NodeId) -> NodeState {
        if id.document == self.document && self.live.contains_key(&id.serial) {
            NodeState::Live
        } else {
            NodeState::Forgotten
        }
    }

    /// Current tree position of a live handle.
    pub fn raw(&self, id: NodeId) -> Option<RawId> {
        self.entry(id).map(|entry| entry.raw)
    }

    pub fn key(&self, id: NodeId) -> Option<&NodeKey> {
        self.entry(id).map(|entry| &entry.key)
    }

    /// Retire one handle. Returns false if it was not live.
    pub fn forget(&mut self, id: NodeId) -> bool {
        if id.document != self.document {
            return false;
        }
        match self.live.remove(&id.serial) {
            Some(entry) => {
                self.by_key.remove(&entry.key);
                true
            }
            None => false,
        }
    }

    /// Retire every handle.
    pub fn forget_all(&mut self) -> usize {
        let count = self.live.len();
        self.live.clear();
        self.by_key.clear();
        count
    }

    /// Live handles in creation order.
    pub fn live_handles(&self) -> Vec<LiveHandle> {
        let mut handles: Vec<_> = self
            .live
            .iter()
            .map(|(&serial, entry)| LiveHandle {
                id: self.id(serial),
                key: entry.key.clone(),
                raw: entry.raw,
            })
            .collect();
        handles.sort_by_key(|handle| handle.id);
        handles
    }

    /// Replace the whole live set after a reparse.
    ///
    /// Every handle named in `outcomes` is either rebound to its new key and
    /// tree position or retired. If two handles claim the same new key the
    /// older one keeps it. Returns the ids that ended up retired.
    pub(crate) fn rebind_all(
        &mut self,
        outcomes: Vec<(NodeId, Option<(NodeKey, RawId)>)>,
    ) -> Vec<NodeId> {
        let mut retired = Vec::new();
        self.live.clear();
        self.by_key.clear();

        for (id, outcome) in outcomes {
            match outcome {
                Some((key, raw)) if !self.by_key.contains_key(&key) => {
                    self.by_key.insert(key.clone(), id.serial);
                    self.live.insert(id.serial, Entry { key, raw });
                }
                _ => retired.push(id),
            }
        }
        retired
    }

    /// Return to the live set of `saved`, a clone taken earlier. Serials
    /// issued since then stay retired.
    pub(crate) fn rollback(&mut self, saved: NodeCache) {
        let next_serial = self.next_serial.max(saved.next_serial);
        *self = saved;
        self.next_serial = next_serial;
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    fn id(&self, serial: u64) -> NodeId {
        NodeId {
            document: self.document,
            serial,
        }
    }

    fn entry(&self, id: NodeId) -> Option<&Entry> {
        if id.document != self.document {
            return None;
        }
        self.live.get(&id.serial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentStore;
    use crate::syntax::{NodeSpec, SyntaxTreeBuilder};
    use std::path::PathBuf;

    fn doc_id() -> DocumentId {
        let mut store = DocumentStore::new();
        store.insert(PathBuf::from("a.ts"), String::new(), SyntaxTreeBuilder::new().finish(0))
    }

    fn tree() -> SyntaxTree {
        let mut builder = SyntaxTreeBuilder::new();
        let root = builder.push(None, NodeSpec::named("program", 0..3));
        builder.push(Some(root), NodeSpec::named("identifier", 0..1));
        builder.push(Some(root), NodeSpec::named("identifier", 2..3));
        builder.finish(3)
    }

    #[test]
    fn rollback_restores_handles_without_reusing_serials() {
        let tree = tree();
        let mut cache = NodeCache::new(doc_id());
        let a = cache.find(&tree, "identifier", 0..1).unwrap();
        let saved = cache.clone();

        cache.forget(a);
        let b = cache.find(&tree, "identifier", 2..3).unwrap();
        cache.rollback(saved);

        assert_eq!(cache.state(a), NodeState::Live);
        assert_eq!(cache.state(b), NodeState::Forgotten);
        let c = cache.find(&tree, "identifier", 2..3).unwrap();
        assert_ne!(c, b);
    }

    #[test]
    fn same_position_same_handle() {
        let tree = tree();
        let mut cache = NodeCache::new(doc_id());
        let a = cache.find(&tree, "identifier", 0..1).unwrap();
        let again = cache.find(&tree, "identifier", 0..1).unwrap();
        let b = cache.find(&tree, "identifier", 2..3).unwrap();

        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn missing_position_yields_none() {
        let tree = tree();
        let mut cache = NodeCache::new(doc_id());
        assert!(cache.find(&tree, "identifier", 1..2).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn forgotten_is_terminal() {
        let tree = tree();
        let mut cache = NodeCache::new(doc_id());
        let a = cache.find(&tree, "identifier", 0..1).unwrap();

        assert!(cache.forget(a));
        assert_eq!(cache.state(a), NodeState::Forgotten);
        assert!(!cache.forget(a));

        // A new lookup at the same position issues a fresh handle.
        let fresh = cache.find(&tree, "identifier", 0..1).unwrap();
        assert_ne!(fresh, a);
        assert_eq!(cache.state(a), NodeState::Forgotten);
        assert_eq!(cache.state(fresh), NodeState::Live);
    }

    #[test]
    fn rebind_all_resolves_key_collisions() {
        let tree = tree();
        let mut cache = NodeCache::new(doc_id());
        let a = cache.find(&tree, "identifier", 0..1).unwrap();
        let b = cache.find(&tree, "identifier", 2..3).unwrap();
        let raw = tree.find("identifier", 2..3).unwrap();
        let key = NodeKey::new("identifier", 2..3);

        let retired = cache.rebind_all(vec![
            (a, Some((key.clone(), raw))),
            (b, Some((key.clone(), raw))),
        ]);

        assert_eq!(retired, vec![b]);
        assert_eq!(cache.key(a), Some(&key));
        assert_eq!(cache.state(b), NodeState::Forgotten);
    }
}
