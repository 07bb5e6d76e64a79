//! Owned, language-neutral syntax trees.
//!
//! An oracle hands back a [`SyntaxTree`] for every parse. The tree is a flat
//! arena in pre-order: index 0 is the root, every node knows its parent and
//! its ordered children, and nothing borrows from the parser or the text.
//! Node handles issued to callers never point into this arena directly; they
//! go through the identity cache, which rebinds them after every reparse.

use std::ops::Range;

/// Index of a node inside one [`SyntaxTree`]. Only meaningful for the tree
/// that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawId(u32);

impl RawId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node as produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNode {
    pub kind: String,
    pub start: usize,
    pub end: usize,
    /// Named nodes are grammar rules; unnamed ones are literal tokens (`,`, `as`, `{`).
    pub named: bool,
    /// ERROR or MISSING node inserted by error recovery.
    pub error: bool,
    /// Field name this node occupies in its parent, if any (`name`, `alias`, `body`).
    pub field: Option<String>,
    pub parent: Option<RawId>,
    pub children: Vec<RawId>,
}

impl RawNode {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Description of a node handed to [`SyntaxTreeBuilder::push`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub kind: String,
    pub range: Range<usize>,
    pub named: bool,
    pub error: bool,
    pub field: Option<String>,
}

impl NodeSpec {
    pub fn named(kind: impl Into<String>, range: Range<usize>) -> Self {
        Self {
            kind: kind.into(),
            range,
            named: true,
            error: false,
            field: None,
        }
    }

    pub fn token(kind: impl Into<String>, range: Range<usize>) -> Self {
        Self {
            named: false,
            ..Self::named(kind, range)
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_error(mut self, error: bool) -> Self {
        self.error = error;
        self
    }
}

/// Builds a [`SyntaxTree`] in pre-order.
#[derive(Debug, Default)]
pub struct SyntaxTreeBuilder {
    nodes: Vec<RawNode>,
}

impl SyntaxTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node. Children must be pushed after their parent and in
    /// source order; the first node pushed is the root.
    pub fn push(&mut self, parent: Option<RawId>, spec: NodeSpec) -> RawId {
        let id = RawId(self.nodes.len() as u32);
        self.nodes.push(RawNode {
            kind: spec.kind,
            start: spec.range.start,
            end: spec.range.end,
            named: spec.named,
            error: spec.error,
            field: spec.field,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }
        id
    }

    /// Finish the tree. The root is stretched to cover the whole text so
    /// that every node's range sits inside its parent's.
    pub fn finish(mut self, text_len: usize) -> SyntaxTree {
        if self.nodes.is_empty() {
            self.push(None, NodeSpec::named("document", 0..text_len));
        }
        let root = &mut self.nodes[0];
        root.start = 0;
        root.end = text_len;
        SyntaxTree { nodes: self.nodes }
    }
}

/// A complete parse of one document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxTree {
    nodes: Vec<RawNode>,
}

impl SyntaxTree {
    pub fn root(&self) -> RawId {
        RawId(0)
    }

    pub fn get(&self, id: RawId) -> &RawNode {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = (RawId, &RawNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (RawId(idx as u32), node))
    }

    /// Parent chain of `id`, nearest first, root last.
    pub fn ancestors(&self, id: RawId) -> impl Iterator<Item = RawId> + '_ {
        std::iter::successors(self.get(id).parent, move |&current| self.get(current).parent)
    }

    /// Position of `id` among its parent's children.
    pub fn child_index(&self, id: RawId) -> Option<usize> {
        let parent = self.get(id).parent?;
        self.get(parent).children.iter().position(|&child| child == id)
    }

    /// Find the outermost node with exactly this kind and range.
    ///
    /// Descends only into children whose range contains the target, so the
    /// cost is proportional to depth rather than tree size.
    pub fn find(&self, kind: &str, range: Range<usize>) -> Option<RawId> {
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            let node = self.get(id);
            if node.start == range.start && node.end == range.end && node.kind == kind {
                return Some(id);
            }
            // Reverse so the leftmost candidate is visited first.
            for &child in node.children.iter().rev() {
                let c = self.get(child);
                if c.start <= range.start && range.end <= c.end {
                    stack.push(child);
                }
            }
        }
        None
    }

    /// Smallest node whose range contains `offset` (end-exclusive, except
    /// at the very end of the text).
    pub fn deepest_at(&self, offset: usize) -> RawId {
        let mut current = self.root();
        'descend: loop {
            for &child in &self.get(current).children {
                let c = self.get(child);
                if c.start <= offset && (offset < c.end || (offset == c.end && c.start == c.end)) {
                    current = child;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    /// Ranges of ERROR / MISSING nodes.
    pub fn error_ranges(&self) -> Vec<Range<usize>> {
        self.nodes
            .iter()
            .filter(|node| node.error)
            .map(RawNode::range)
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        self.nodes.iter().any(|node| node.error)
    }

    /// Strict descendants of `id` in pre-order.
    pub fn descendants(&self, id: RawId) -> Vec<RawId> {
        let mut out = Vec::new();
        let mut stack: Vec<RawId> = self.get(id).children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.get(current).children.iter().rev().copied());
        }
        out
    }

    /// Child of `id` stored under `field`.
    pub fn child_by_field(&self, id: RawId, field: &str) -> Option<RawId> {
        self.get(id)
            .children
            .iter()
            .copied()
            .find(|&child| self.get(child).field.as_deref() == Some(field))
    }
}
