//! Tree synchronizer.
//!
//! After the text of a document changes, every live handle is reconciled
//! against the freshly parsed tree. Each handle's old range is classified
//! against the change's invalidated range, which yields one or more expected
//! new ranges; the handle is rebound to the first node in the new tree with
//! the same kind at an expected range, and forgotten otherwise.
//!
//! | old range `[s, e)`                  | expected new range          |
//! |-------------------------------------|-----------------------------|
//! | entirely before the edit            | `[s, e)`                    |
//! | entirely after the edit             | `[s + delta, e + delta)`    |
//! | contains the edit                   | `[s, e + delta)`            |
//! | anything else                       | forgotten                   |
//!
//! Descendants of a forgotten node are forgotten with it.

use crate::cache::{NodeCache, NodeKey};
use crate::document::Document;
use crate::edit::{ChangeDescriptor, TextChange};
use crate::oracle::{Oracle, OracleError};
use crate::syntax::SyntaxTree;
use std::collections::HashMap;
use std::ops::Range;

/// What happened to the live handles of one document during a sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Rebound at the same offsets.
    pub kept: usize,
    /// Rebound after moving by the edit's delta.
    pub shifted: usize,
    /// Rebound after the edit landed inside them.
    pub grown: usize,
    pub forgotten: usize,
}

impl SyncStats {
    pub fn survivors(&self) -> usize {
        self.kept + self.shifted + self.grown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Candidate {
    Keep,
    Shift,
    Grow,
}

impl Candidate {
    fn expected(self, range: &Range<usize>, change: &ChangeDescriptor) -> Range<usize> {
        match self {
            Candidate::Keep => range.clone(),
            Candidate::Shift => change.shift(range.start)..change.shift(range.end),
            Candidate::Grow => range.start..change.shift(range.end),
        }
    }
}

/// Candidate moves for a node with old range `range`, most likely first.
/// `None` when the edit cuts across the node.
fn classify(range: &Range<usize>, change: &ChangeDescriptor) -> Option<&'static [Candidate]> {
    use Candidate::*;

    let (s, e) = (range.start, range.end);
    let (is, ie) = (change.invalidated.start, change.invalidated.end);

    if is == ie {
        let p = is;
        let candidates: &'static [Candidate] = if s == p && e == p {
            &[Shift, Keep, Grow]
        } else if e < p {
            &[Keep]
        } else if s > p {
            &[Shift]
        } else if e == p {
            &[Keep, Grow]
        } else if s == p {
            &[Shift, Grow]
        } else {
            &[Grow]
        };
        return Some(candidates);
    }

    if e <= is {
        Some(&[Keep])
    } else if s >= ie {
        Some(&[Shift])
    } else if s <= is && ie <= e && !(s == is && e == ie) {
        Some(&[Grow])
    } else {
        None
    }
}

/// Parse the text a change would produce. Nothing is committed.
pub fn reparse(
    oracle: &dyn Oracle,
    document: &Document,
    change: &TextChange,
) -> Result<SyntaxTree, OracleError> {
    oracle.parse(document.path(), &change.new_text)
}

/// Install `change` and its parsed `tree` into `document` and reconcile every
/// live handle in `cache`.
pub fn commit(
    document: &mut Document,
    cache: &mut NodeCache,
    change: TextChange,
    tree: SyntaxTree,
) -> SyncStats {
    let descriptor = change.descriptor;
    let old_tree = document.replace(change.new_text, tree);
    let new_tree = document.tree();

    // Pre-order, so a parent is always decided before its children.
    let mut doomed = vec![false; old_tree.len()];
    for (id, node) in old_tree.iter() {
        let parent_doomed = node.parent.is_some_and(|parent| doomed[parent.index()]);
        doomed[id.index()] = parent_doomed || classify(&node.range(), &descriptor).is_none();
    }

    let handles = cache.live_handles();
    let mut moves = HashMap::new();
    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        let old_range = handle.key.range();
        let rebound = if doomed[handle.raw.index()] {
            None
        } else {
            let rebound = classify(&old_range, &descriptor)
                .into_iter()
                .flatten()
                .find_map(|&candidate| {
                    let expected = candidate.expected(&old_range, &descriptor);
                    new_tree
                        .find(&handle.key.kind, expected.clone())
                        .map(|raw| (candidate, NodeKey::new(handle.key.kind.clone(), expected), raw))
                });
            if rebound.is_none() {
                log::warn!(
                    "{}: no `{}` at the expected position of {:?} after edit",
                    handle.id,
                    handle.key.kind,
                    old_range
                );
            }
            rebound
        };

        outcomes.push((
            handle.id,
            rebound.map(|(candidate, key, raw)| {
                moves.insert(handle.id, candidate);
                (key, raw)
            }),
        ));
    }

    let retired = cache.rebind_all(outcomes);

    let mut stats = SyncStats {
        forgotten: retired.len(),
        ..SyncStats::default()
    };
    for (id, candidate) in moves {
        if retired.contains(&id) {
            continue;
        }
        match candidate {
            Candidate::Keep => stats.kept += 1,
            Candidate::Shift => stats.shifted += 1,
            Candidate::Grow => stats.grown += 1,
        }
    }

    log::debug!(
        "{} v{}: synced handles (kept {}, shifted {}, grown {}, forgotten {})",
        document.path().display(),
        document.version(),
        stats.kept,
        stats.shifted,
        stats.grown,
        stats.forgotten
    );
    stats
}

/// Reparse and commit in one step. On a parse failure the document and the
/// cache are left untouched.
pub fn synchronize(
    oracle: &dyn Oracle,
    document: &mut Document,
    cache: &mut NodeCache,
    change: TextChange,
) -> Result<SyncStats, OracleError> {
    let tree = reparse(oracle, document, &change)?;
    Ok(commit(document, cache, change, tree))
}
