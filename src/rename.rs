//! Multi-file rename.
//!
//! A rename resolves the symbol at a node, collects every reference location
//! from the oracle and groups them per file. Each file's spans are checked
//! up front (no overlaps, each span still spells the old name) and, when the
//! project rejects syntax errors, the final text of every file is parsed and
//! checked before anything is written. Spans are then applied one at a time
//! from the end of the file towards the start, so each replacement leaves
//! the offsets of the remaining ones intact. If a later file fails to apply,
//! every file already rewritten is restored.

use crate::cache::NodeId;
use crate::document::DocumentId;
use crate::edit::{self, ChangeDescriptor, EditRequest, EditVerification, TextSpan};
use crate::error::{MorphError, Result};
use crate::oracle::Symbol;
use crate::project::Project;
use crate::sync::SyncStats;
use crate::validate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One occurrence to rewrite.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RenameSite {
    pub span: TextSpan,
    /// Kept in front of the new name (`x: ` for a shorthand property).
    pub prefix: Option<String>,
}

impl RenameSite {
    pub fn replacement(&self, new_name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{new_name}"),
            None => new_name.to_string(),
        }
    }
}

/// All sites of one file touched by a rename, sorted by descending start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameBatch {
    pub document: DocumentId,
    pub path: PathBuf,
    pub sites: Vec<RenameSite>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenamedFile {
    pub path: PathBuf,
    /// Spans in the text as it was before the rename, ascending.
    pub spans: Vec<TextSpan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameReport {
    pub old_name: String,
    pub new_name: String,
    pub files: Vec<RenamedFile>,
    #[serde(skip)]
    pub stats: SyncStats,
}

impl RenameReport {
    fn empty(old_name: &str, new_name: &str) -> Self {
        Self {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
            files: Vec::new(),
            stats: SyncStats::default(),
        }
    }

    pub fn span_count(&self) -> usize {
        self.files.iter().map(|file| file.spans.len()).sum()
    }

    pub fn is_noop(&self) -> bool {
        self.files.is_empty()
    }
}

/// Group the reference locations of `symbol` into per-file batches, checked
/// against the current text.
pub fn plan(project: &Project, symbol: &Symbol) -> Result<Vec<RenameBatch>> {
    let store = project.store();
    let mut by_path: BTreeMap<PathBuf, Vec<RenameSite>> = BTreeMap::new();
    for location in project.oracle().find_reference_locations(store, symbol) {
        by_path.entry(location.path).or_default().push(RenameSite {
            span: location.span,
            prefix: location.prefix,
        });
    }

    let verification = EditVerification::ExactMatch(symbol.name.clone());
    let mut batches = Vec::with_capacity(by_path.len());
    for (path, mut sites) in by_path {
        let document = store
            .id_for_path(&path)
            .and_then(|id| store.get(id))
            .ok_or_else(|| MorphError::not_found(format!("document {}", path.display())))?;

        sites.sort();
        sites.dedup_by(|a, b| a.span == b.span);
        for pair in sites.windows(2) {
            if pair[0].span.end() > pair[1].span.start {
                return Err(MorphError::invalid(format!(
                    "overlapping rename spans in {} at {} and {}",
                    path.display(),
                    pair[0].span.start,
                    pair[1].span.start
                )));
            }
        }
        for site in &sites {
            verification.verify(&path, document.text(), site.span.range())?;
        }

        sites.reverse();
        batches.push(RenameBatch {
            document: document.id(),
            path,
            sites,
        });
    }
    Ok(batches)
}

/// Final text of a batch's file, plus one descriptor covering every span.
fn dry_run(text: &str, batch: &RenameBatch, new_name: &str) -> Result<(String, ChangeDescriptor)> {
    let mut current = text.to_string();
    let mut delta = 0isize;
    for site in &batch.sites {
        let request =
            EditRequest::replace(site.span.start, site.span.end(), site.replacement(new_name));
        let change = edit::apply_edit(&current, &request)?;
        delta += change.descriptor.delta;
        current = change.new_text;
    }

    // Descending order: first span is the last in the file.
    let start = batch.sites.last().map_or(0, |site| site.span.start);
    let end = batch.sites.first().map_or(0, |site| site.span.end());
    let inserted_len = (end as isize - start as isize + delta) as usize;
    Ok((
        current,
        ChangeDescriptor {
            invalidated: start..end,
            delta,
            inserted_len,
        },
    ))
}

pub fn rename(project: &mut Project, node: NodeId, new_name: &str) -> Result<RenameReport> {
    if new_name.trim().is_empty() {
        return Err(MorphError::invalid("new name must not be empty"));
    }

    let symbol = project.symbol_of(node)?;
    if symbol.name == new_name {
        return Ok(RenameReport::empty(&symbol.name, new_name));
    }

    let batches = plan(project, &symbol)?;
    if batches.is_empty() {
        log::info!("rename {} -> {}: no references", symbol.name, new_name);
        return Ok(RenameReport::empty(&symbol.name, new_name));
    }

    if project.settings().reject_syntax_errors {
        for batch in &batches {
            let document = project.document_or_err(batch.document)?;
            let (text, descriptor) = dry_run(document.text(), batch, new_name)?;
            let tree = project.oracle().parse(&batch.path, &text)?;
            validate::check_edit(batch.path.clone(), document.tree(), &tree, &text, &descriptor)?;
        }
    }

    let documents: Vec<_> = batches.iter().map(|batch| batch.document).collect();
    let checkpoint = project.checkpoint(&documents);

    let mut report = RenameReport::empty(&symbol.name, new_name);
    for batch in batches {
        if let Err(err) = apply_batch(project, &batch, new_name, &mut report.stats) {
            log::warn!(
                "rename {} -> {} failed in {}, restoring {} files: {err}",
                symbol.name,
                new_name,
                batch.path.display(),
                documents.len()
            );
            project.restore(checkpoint);
            return Err(err);
        }

        let spans = batch.sites.into_iter().rev().map(|site| site.span).collect();
        report.files.push(RenamedFile {
            path: batch.path,
            spans,
        });
    }

    log::info!(
        "renamed {} -> {}: {} occurrences in {} files",
        report.old_name,
        report.new_name,
        report.span_count(),
        report.files.len()
    );
    Ok(report)
}

fn apply_batch(
    project: &mut Project,
    batch: &RenameBatch,
    new_name: &str,
    stats: &mut SyncStats,
) -> Result<()> {
    for site in &batch.sites {
        let request =
            EditRequest::replace(site.span.start, site.span.end(), site.replacement(new_name));
        let outcome = project.apply_request(batch.document, &request, false)?;
        accumulate(stats, outcome.stats);
    }
    Ok(())
}

fn accumulate(total: &mut SyncStats, stats: SyncStats) {
    total.kept += stats.kept;
    total.shifted += stats.shifted;
    total.grown += stats.grown;
    total.forgotten += stats.forgotten;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(spans: &[(usize, usize)]) -> RenameBatch {
        RenameBatch {
            document: {
                let mut store = crate::document::DocumentStore::new();
                store.insert(
                    PathBuf::from("a.ts"),
                    String::new(),
                    crate::syntax::SyntaxTreeBuilder::new().finish(0),
                )
            },
            path: PathBuf::from("a.ts"),
            sites: spans
                .iter()
                .map(|&(s, l)| RenameSite {
                    span: TextSpan::new(s, l),
                    prefix: None,
                })
                .collect(),
        }
    }

    #[test]
    fn dry_run_applies_descending_spans() {
        let text = "x + x * x";
        let (result, descriptor) = dry_run(text, &batch(&[(8, 1), (4, 1), (0, 1)]), "abc").unwrap();

        assert_eq!(result, "abc + abc * abc");
        assert_eq!(descriptor.invalidated, 0..9);
        assert_eq!(descriptor.delta, 6);
        assert_eq!(descriptor.inserted_len, 15);
    }

    #[test]
    fn dry_run_keeps_shorthand_prefix() {
        let text = "{ x } + x";
        let mut batch = batch(&[(8, 1), (2, 1)]);
        batch.sites[1].prefix = Some("x: ".to_string());

        let (result, _) = dry_run(text, &batch, "y").unwrap();
        assert_eq!(result, "{ x: y } + y");
    }

    #[test]
    fn report_counts_spans() {
        let mut report = RenameReport::empty("a", "b");
        assert!(report.is_noop());
        report.files.push(RenamedFile {
            path: PathBuf::from("a.ts"),
            spans: vec![TextSpan::new(0, 1), TextSpan::new(5, 1)],
        });
        assert_eq!(report.span_count(), 2);
    }
}
