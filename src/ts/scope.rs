//! Name roles, lexical scopes and module specifiers.
//!
//! The oracle resolves names without a type checker. A name token is either
//! a member name (property keys, member accesses, struct fields), which is
//! matched by spelling alone, or a scoped name bound by the nearest
//! enclosing scope that declares it. Names on the far side of an
//! import/export alias belong to another module.

use crate::syntax::{RawId, SyntaxTree};
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

/// Nodes that open a scope.
const SCOPE_KINDS: &[&str] = &[
    // TypeScript / JavaScript
    "program",
    "statement_block",
    "function_declaration",
    "generator_function_declaration",
    "function_expression",
    "function",
    "generator_function",
    "arrow_function",
    "method_definition",
    "class_declaration",
    "abstract_class_declaration",
    "class",
    "interface_declaration",
    "type_alias_declaration",
    "for_statement",
    "for_in_statement",
    "catch_clause",
    // Rust
    "source_file",
    "block",
    "function_item",
    "closure_expression",
    "impl_item",
    "trait_item",
    "struct_item",
    "enum_item",
];

/// Declarations whose name binds in the scope around them rather than in
/// the scope they open.
const HOISTED_KINDS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "function_signature",
    "class_declaration",
    "abstract_class_declaration",
    "interface_declaration",
    "type_alias_declaration",
    "enum_declaration",
    "module",
    "function_item",
    "function_signature_item",
    "struct_item",
    "enum_item",
    "union_item",
    "trait_item",
    "type_item",
    "const_item",
    "static_item",
    "mod_item",
    "macro_definition",
];

const SCOPED_NAME_KINDS: &[&str] = &[
    "identifier",
    "type_identifier",
    "shorthand_property_identifier",
    "shorthand_property_identifier_pattern",
];

const MEMBER_NAME_KINDS: &[&str] = &[
    "property_identifier",
    "field_identifier",
    "private_property_identifier",
];

/// What a name token names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    /// Bound by a scope of this file.
    Scoped,
    /// Property, method or field name.
    Member,
    /// `x` in `import { x as y } from '...'`.
    ImportedName,
    /// `x` in `export { x } from '...'` or `export { x as y } from '...'`.
    ReexportedName,
    /// `y` in `export { x as y }`.
    ExportedAlias,
}

impl Role {
    pub(crate) fn is_foreign(self) -> bool {
        matches!(self, Role::ImportedName | Role::ReexportedName | Role::ExportedAlias)
    }
}

/// Role of `id`, or `None` when it is not a name token.
pub(crate) fn role(tree: &SyntaxTree, id: RawId) -> Option<Role> {
    let node = tree.get(id);
    if !node.named || !node.is_leaf() {
        return None;
    }
    let kind = node.kind.as_str();
    if MEMBER_NAME_KINDS.contains(&kind) {
        return Some(Role::Member);
    }
    if !SCOPED_NAME_KINDS.contains(&kind) {
        return None;
    }
    let Some(parent) = node.parent else {
        return Some(Role::Scoped);
    };

    let role = match (tree.get(parent).kind.as_str(), node.field.as_deref()) {
        ("import_specifier", Some("name")) if tree.child_by_field(parent, "alias").is_some() => {
            Role::ImportedName
        }
        ("export_specifier", Some("alias")) => Role::ExportedAlias,
        ("export_specifier", Some("name")) if module_statement(tree, parent).is_some() => {
            Role::ReexportedName
        }
        // `path::name` in Rust names an item of another module.
        ("scoped_identifier" | "scoped_type_identifier", Some("name")) => Role::Member,
        _ => Role::Scoped,
    };
    Some(role)
}

/// `{ x }` / `{ x } = o`: the token is both a property key and a binding.
pub(crate) fn is_shorthand(tree: &SyntaxTree, id: RawId) -> bool {
    tree.get(id).kind.starts_with("shorthand_property_identifier")
}

/// Where the scope search for a declaration token starts, or `None` when the
/// token does not declare anything.
fn declaration_anchor(tree: &SyntaxTree, id: RawId) -> Option<RawId> {
    let node = tree.get(id);
    let parent = node.parent?;
    if node.kind == "shorthand_property_identifier_pattern" {
        return Some(parent);
    }

    let parent_kind = tree.get(parent).kind.as_str();
    match (parent_kind, node.field.as_deref()) {
        (kind, Some("name")) if HOISTED_KINDS.contains(&kind) => {
            Some(tree.get(parent).parent.unwrap_or(parent))
        }
        (
            "variable_declarator" | "function_expression" | "function" | "generator_function"
            | "class" | "type_parameter",
            Some("name"),
        )
        | (
            "required_parameter" | "optional_parameter" | "parameter" | "let_declaration",
            Some("pattern"),
        )
        | ("arrow_function" | "catch_clause", Some("parameter"))
        | ("for_in_statement", Some("left"))
        | ("pair_pattern", Some("value"))
        | ("assignment_pattern" | "object_assignment_pattern", Some("left"))
        | ("import_specifier", Some("alias")) => Some(parent),
        ("import_specifier", Some("name")) if tree.child_by_field(parent, "alias").is_none() => {
            Some(parent)
        }
        (
            "formal_parameters" | "closure_parameters" | "array_pattern" | "rest_pattern"
            | "tuple_pattern" | "namespace_import" | "import_clause",
            _,
        ) => Some(parent),
        _ => None,
    }
}

pub(crate) fn is_declaration(tree: &SyntaxTree, id: RawId) -> bool {
    declaration_anchor(tree, id).is_some()
}

fn is_scope(tree: &SyntaxTree, id: RawId) -> bool {
    SCOPE_KINDS.contains(&tree.get(id).kind.as_str())
}

/// Nearest scope at or above `id`; the root when nothing else qualifies.
fn nearest_scope(tree: &SyntaxTree, id: RawId) -> RawId {
    std::iter::once(id)
        .chain(tree.ancestors(id))
        .find(|&candidate| is_scope(tree, candidate))
        .unwrap_or_else(|| tree.root())
}

/// Declared names per scope of one file.
pub(crate) struct FileScopes<'a> {
    tree: &'a SyntaxTree,
    text: &'a str,
    declared: HashMap<RawId, HashSet<&'a str>>,
}

impl<'a> FileScopes<'a> {
    pub(crate) fn new(tree: &'a SyntaxTree, text: &'a str) -> Self {
        let mut declared: HashMap<RawId, HashSet<&'a str>> = HashMap::new();
        for (id, node) in tree.iter() {
            if role(tree, id) != Some(Role::Scoped) {
                continue;
            }
            if let Some(anchor) = declaration_anchor(tree, id) {
                declared
                    .entry(nearest_scope(tree, anchor))
                    .or_default()
                    .insert(&text[node.range()]);
            }
        }
        Self {
            tree,
            text,
            declared,
        }
    }

    /// Scope that binds the scoped name token `id`. Names no scope declares
    /// are bound by the root.
    pub(crate) fn binding_scope(&self, id: RawId) -> RawId {
        let tree = self.tree;
        if let Some(anchor) = declaration_anchor(tree, id) {
            return nearest_scope(tree, anchor);
        }
        let name = &self.text[tree.get(id).range()];
        tree.ancestors(id)
            .filter(|&scope| is_scope(tree, scope))
            .find(|scope| {
                self.declared
                    .get(scope)
                    .is_some_and(|names| names.contains(name))
            })
            .unwrap_or_else(|| tree.root())
    }

    /// Scoped tokens spelling `name` that `scope` binds.
    pub(crate) fn bound_tokens(&self, scope: RawId, name: &str) -> Vec<RawId> {
        self.tree
            .iter()
            .filter(|(id, node)| {
                &self.text[node.range()] == name && role(self.tree, *id) == Some(Role::Scoped)
            })
            .map(|(id, _)| id)
            .filter(|&id| self.binding_scope(id) == scope)
            .collect()
    }
}

/// The `import`/`export ... from` statement around `id` that names a module.
pub(crate) fn module_statement(tree: &SyntaxTree, id: RawId) -> Option<RawId> {
    let statement = std::iter::once(id)
        .chain(tree.ancestors(id))
        .find(|&candidate| {
            matches!(tree.get(candidate).kind.as_str(), "import_statement" | "export_statement")
        })?;
    tree.child_by_field(statement, "source").map(|_| statement)
}

/// Module specifier of an import/export statement, quotes stripped.
pub(crate) fn module_specifier<'t>(tree: &SyntaxTree, text: &'t str, statement: RawId) -> Option<&'t str> {
    let source = tree.child_by_field(statement, "source")?;
    Some(text[tree.get(source).range()].trim_matches(['"', '\'', '`']))
}

/// Paths a relative module specifier may refer to, most specific first.
/// Bare specifiers (packages) resolve to nothing.
pub(crate) fn module_candidates(importer: &Path, specifier: &str) -> Vec<PathBuf> {
    if !specifier.starts_with('.') {
        return Vec::new();
    }
    let dir = importer.parent().unwrap_or_else(|| Path::new(""));
    let base = normalize(&dir.join(specifier));

    let mut candidates = vec![base.clone()];
    if matches!(base.extension().and_then(|ext| ext.to_str()), Some("js" | "jsx" | "mjs")) {
        for ext in ["ts", "tsx", "mts"] {
            candidates.push(base.with_extension(ext));
        }
    }
    for ext in ["ts", "tsx", "d.ts", "js", "jsx", "mts", "mjs"] {
        let mut path = base.clone().into_os_string();
        path.push(".");
        path.push(ext);
        candidates.push(PathBuf::from(path));
    }
    for index in ["index.ts", "index.tsx", "index.js"] {
        candidates.push(base.join(index));
    }
    candidates
}

/// Lexically resolve `.` and `..` components.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}
