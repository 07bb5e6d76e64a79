//! Higher-level manipulations built on the project's edit primitives.
//!
//! Import/export specifiers (`x`, `x as y` inside `{ ... }`) and braced
//! member bodies (interfaces, classes, enums, Rust impls and structs).

use crate::cache::NodeId;
use crate::edit::EditRequest;
use crate::error::{MorphError, Result};
use crate::project::Project;

/// The specifier constructs the helpers understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecifierKind {
    Import,
    Export,
}

impl SpecifierKind {
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "import_specifier" => Some(SpecifierKind::Import),
            "export_specifier" => Some(SpecifierKind::Export),
            _ => None,
        }
    }

    /// Statement that owns a specifier of this kind.
    pub fn statement_kind(self) -> &'static str {
        match self {
            SpecifierKind::Import => "import_statement",
            SpecifierKind::Export => "export_statement",
        }
    }
}

const MEMBER_EXCLUDED_KINDS: &[&str] = &["comment", "line_comment", "block_comment"];

impl Project {
    pub fn specifier_kind(&self, spec: NodeId) -> Result<SpecifierKind> {
        let kind = self.kind(spec)?;
        SpecifierKind::from_kind(kind).ok_or_else(|| {
            MorphError::invalid(format!("{spec} is a `{kind}`, not an import or export specifier"))
        })
    }

    fn specifier_name(&mut self, spec: NodeId) -> Result<NodeId> {
        self.specifier_kind(spec)?;
        self.child_by_field(spec, "name")?
            .ok_or_else(|| MorphError::not_found(format!("name of {spec}")))
    }

    /// Handle to the specifier after an edit that may have retired `spec`.
    fn specifier_after_edit(&mut self, spec: NodeId, kind: &str, start: usize) -> Result<NodeId> {
        if self.is_live(spec) {
            return Ok(spec);
        }
        let document = spec.document();
        let at = self.deepest_node_at(document, start)?;
        let mut candidates = vec![at];
        candidates.extend(self.ancestors(at)?);
        for candidate in candidates {
            if self.kind(candidate)? == kind && self.range(candidate)?.start == start {
                return Ok(candidate);
            }
        }
        Err(MorphError::not_found(format!("`{kind}` at {start} after edit")))
    }

    /// Rewrite the imported/exported name. The alias, if any, is untouched.
    /// Returns the (possibly new) specifier handle.
    pub fn set_specifier_name(&mut self, spec: NodeId, name: &str) -> Result<NodeId> {
        let name_node = self.specifier_name(spec)?;
        if self.text(name_node)? == name {
            return Ok(spec);
        }
        let kind = self.kind(spec)?.to_string();
        let start = self.range(spec)?.start;
        let range = self.range(name_node)?;

        self.replace_range(spec.document(), range, name)?;
        self.specifier_after_edit(spec, &kind, start)
    }

    /// The identifier after `as`, if present.
    pub fn specifier_alias(&mut self, spec: NodeId) -> Result<Option<NodeId>> {
        self.specifier_kind(spec)?;
        self.child_by_field(spec, "alias")
    }

    /// Give the specifier the alias `alias`.
    ///
    /// A specifier without an alias first gets ` as <name>`, which changes
    /// nothing, and that alias is then renamed. For imports the alias is the
    /// local binding, so every local reference follows. For exports it is the
    /// name other modules import, so their specifiers and, where they import
    /// without an alias, their uses follow.
    pub fn set_specifier_alias(&mut self, spec: NodeId, alias: &str) -> Result<NodeId> {
        if alias.trim().is_empty() {
            return Err(MorphError::invalid("alias must not be empty"));
        }
        let spec_kind = self.specifier_kind(spec)?;
        let kind = self.kind(spec)?.to_string();
        let start = self.range(spec)?.start;

        let alias_node = match self.specifier_alias(spec)? {
            Some(existing) => existing,
            None => {
                let name_node = self.specifier_name(spec)?;
                let name = self.text(name_node)?.to_string();
                let index = self.child_index(name_node)?.unwrap_or(0) + 1;
                let position = self.range(name_node)?.end;
                let added =
                    self.insert_into_parent(spec, index, position, &format!(" as {name}"), 2)?;
                added[1]
            }
        };

        if self.text(alias_node)? != alias {
            let report = self.rename(alias_node, alias)?;
            log::debug!(
                "{spec_kind:?} alias {} -> {}: {} files",
                report.old_name,
                report.new_name,
                report.files.len()
            );
        }
        self.specifier_after_edit(spec, &kind, start)
    }

    /// Remove the specifier from its list. When it is the last one, a
    /// re-export becomes `export * from '...'` and any other import/export
    /// statement is removed.
    pub fn remove_specifier(&mut self, spec: NodeId) -> Result<()> {
        let spec_kind = self.specifier_kind(spec)?;
        match self.remove_list_element(spec) {
            Ok(_) => return Ok(()),
            Err(MorphError::Edit(crate::edit::EditError::SoleListElement { .. })) => {}
            Err(err) => return Err(err),
        }

        // `import d, { x } from 'm'` keeps the default import.
        let container = self
            .parent(spec)?
            .ok_or_else(|| MorphError::invalid(format!("{spec} has no parent")))?;
        if let Some(clause) = self.parent(container)? {
            if self.kind(clause)? == "import_clause" && self.named_children(clause)?.len() > 1 {
                self.remove_list_element(container)?;
                return Ok(());
            }
            if spec_kind == SpecifierKind::Export
                && self.kind(clause)? == "export_statement"
                && self.child_by_field(clause, "source")?.is_some()
            {
                let range = self.range(container)?;
                self.replace_range(spec.document(), range, "*")?;
                return Ok(());
            }
        }

        let statement = self
            .first_ancestor_by_kind(spec, spec_kind.statement_kind())?
            .ok_or_else(|| {
                MorphError::not_found(format!("`{}` around {spec}", spec_kind.statement_kind()))
            })?;
        self.remove_node(statement)?;
        Ok(())
    }

    /// Members of a braced body, comments excluded.
    pub fn members(&mut self, body: NodeId) -> Result<Vec<NodeId>> {
        let children = self.named_children(body)?;
        let mut members = Vec::with_capacity(children.len());
        for child in children {
            if !MEMBER_EXCLUDED_KINDS.contains(&self.kind(child)?) {
                members.push(child);
            }
        }
        Ok(members)
    }

    /// Member whose `name` field reads `name`.
    pub fn member_by_name(&mut self, body: NodeId, name: &str) -> Result<Option<NodeId>> {
        for member in self.members(body)? {
            if self.member_name(member)?.as_deref() == Some(name) {
                return Ok(Some(member));
            }
        }
        Ok(None)
    }

    /// Like [`Project::member_by_name`], failing with the closest existing
    /// name as a suggestion.
    pub fn member_by_name_or_err(&mut self, body: NodeId, name: &str) -> Result<NodeId> {
        if let Some(member) = self.member_by_name(body, name)? {
            return Ok(member);
        }

        let mut names = Vec::new();
        for member in self.members(body)? {
            if let Some(existing) = self.member_name(member)? {
                names.push(existing);
            }
        }
        Err(MorphError::NotFound {
            what: format!("member `{name}`"),
            suggestion: closest(name, &names),
        })
    }

    fn member_name(&mut self, member: NodeId) -> Result<Option<String>> {
        Ok(match self.child_by_field(member, "name")? {
            Some(name) => Some(self.text(name)?.to_string()),
            None => None,
        })
    }

    /// Insert `text` as the member at `index` of a braced body, on its own
    /// line with the configured indentation. Returns the new member.
    pub fn insert_member(&mut self, body: NodeId, index: usize, text: &str) -> Result<NodeId> {
        let document = body.document();
        let range = self.range(body)?;
        let (open, close) = {
            let source = self.document_or_err(document)?.text();
            let inner = &source[range.clone()];
            if !(inner.starts_with('{') && inner.ends_with('}')) {
                return Err(MorphError::invalid(format!("{body} is not a braced body")));
            }
            (range.start, range.end - 1)
        };

        let members = self.members(body)?;
        let index = index.min(members.len());
        let settings = self.settings();
        let newline = settings.newline_str().to_string();
        let unit = settings.indentation.clone();

        let source = self.document_or_err(document)?.text();
        let base = line_indentation(source, open);
        let indent = format!("{base}{unit}");

        let (position, insertion) = if let Some(&next) = members.get(index) {
            let position = self.range(next)?.start;
            (position, format!("{text}{newline}{indent}"))
        } else if members.is_empty() {
            let inner = &source[open + 1..close];
            let mut insertion = format!("{newline}{indent}{text}");
            if !inner.contains('\n') {
                insertion.push_str(&newline);
                insertion.push_str(base);
            }
            (open + 1, insertion)
        } else {
            // After the last member and any separator that follows it.
            let before_close = source[..close].trim_end().len();
            (before_close, format!("{newline}{indent}{text}"))
        };

        self.apply_edit(document, EditRequest::insert(position, insertion, 1))?;

        let members = self.members(body)?;
        members.get(index).copied().ok_or_else(|| {
            MorphError::invalid(format!("inserted text did not produce a member of {body}"))
        })
    }
}

/// Leading whitespace of the line containing `offset`.
fn line_indentation(source: &str, offset: usize) -> &str {
    let line_start = source[..offset].rfind('\n').map_or(0, |nl| nl + 1);
    let line = &source[line_start..];
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width]
}

/// Closest candidate by edit distance, if any is reasonably close.
fn closest(name: &str, candidates: &[String]) -> Option<String> {
    candidates
        .iter()
        .map(|candidate| (strsim::levenshtein(name, candidate), candidate))
        .filter(|(distance, candidate)| *distance <= (candidate.len().max(name.len()) / 2).max(1))
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate.clone())
}
