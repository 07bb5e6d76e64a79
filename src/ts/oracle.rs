use crate::config::Settings;
use crate::document::{Document, DocumentId, DocumentStore};
use crate::edit::TextSpan;
use crate::oracle::{
    DeclarationLocation, Oracle, OracleError, ReferenceLocation, Symbol, SymbolOrigin,
    SymbolScope,
};
use crate::pool;
use crate::syntax::{RawId, SyntaxTree};
use crate::ts::parser::Grammar;
use crate::ts::scope::{self, FileScopes, Role};
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Import/export chains longer than this are not followed.
const MAX_HOPS: usize = 8;

/// Oracle backed by tree-sitter grammars.
///
/// Resolution is lexical. A scoped name is bound by the nearest enclosing
/// scope that declares it, member names (`o.x`, `{ x: 1 }`, struct fields)
/// match by spelling, and relative imports are followed to the exporting
/// document when it is in the store. There is no type checker behind it.
#[derive(Debug, Clone, Default)]
pub struct TreeSitterOracle {
    extensions: HashMap<String, Grammar>,
    fallback: Option<Grammar>,
}

impl TreeSitterOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse files with extension `ext` using `grammar`, overriding the
    /// built-in mapping.
    pub fn with_extension(mut self, ext: impl Into<String>, grammar: Grammar) -> Self {
        self.extensions.insert(ext.into(), grammar);
        self
    }

    /// Grammar for paths no mapping recognises.
    pub fn with_fallback(mut self, grammar: Grammar) -> Self {
        self.fallback = Some(grammar);
        self
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let mut oracle = Self::new();
        for (ext, grammar) in &settings.extensions {
            oracle = oracle.with_extension(ext.clone(), *grammar);
        }
        if let Some(grammar) = settings.fallback_grammar {
            oracle = oracle.with_fallback(grammar);
        }
        oracle
    }
}

impl Oracle for TreeSitterOracle {
    fn parse(&self, path: &Path, text: &str) -> Result<SyntaxTree, OracleError> {
        let grammar = self
            .grammar_for(path)
            .ok_or_else(|| OracleError::UnsupportedLanguage {
                path: path.to_path_buf(),
            })?;
        let tree = pool::with_parser(grammar, |parser| parser.parse_syntax(text))??;
        Ok(tree)
    }

    fn grammar_for(&self, path: &Path) -> Option<Grammar> {
        let ext = path.extension().and_then(|ext| ext.to_str());
        ext.and_then(|ext| self.extensions.get(ext).copied())
            .or_else(|| ext.and_then(Grammar::from_extension))
            .or(self.fallback)
    }

    fn resolve_symbol(
        &self,
        store: &DocumentStore,
        document: DocumentId,
        range: Range<usize>,
    ) -> Option<Symbol> {
        let doc = store.get(document)?;
        let tree = doc.tree();
        let id = innermost_with_range(tree, range)?;
        let token = if scope::role(tree, id).is_some() {
            id
        } else {
            tree.child_by_field(id, "name")
                .filter(|&child| scope::role(tree, child).is_some())?
        };
        Some(symbol_for_token(store, doc, token, 0))
    }

    fn find_reference_locations(
        &self,
        store: &DocumentStore,
        symbol: &Symbol,
    ) -> Vec<ReferenceLocation> {
        let mut found = Found::new(&symbol.name);
        match (symbol.origin, &symbol.scope) {
            (SymbolOrigin::Member, _) | (_, None) => {
                for doc in store.iter() {
                    let tree = doc.tree();
                    for (id, node) in tree.iter() {
                        if doc.text()[node.range()] == symbol.name
                            && scope::role(tree, id) == Some(Role::Member)
                        {
                            found.push(doc, id);
                        }
                    }
                }
            }
            (SymbolOrigin::Local, Some(at)) => {
                let Some((doc, scope_id)) = locate_scope(store, at) else {
                    return Vec::new();
                };
                let tree = doc.tree();
                let scopes = FileScopes::new(tree, doc.text());
                for id in scopes.bound_tokens(scope_id, &symbol.name) {
                    found.push(doc, id);
                }
                if scope_id == tree.root() && exports_directly(doc, &symbol.name) {
                    importers(store, doc, &symbol.name, &mut found);
                }
            }
            (SymbolOrigin::Foreign, Some(at)) => {
                let Some((doc, specifier)) = locate_scope(store, at) else {
                    return Vec::new();
                };
                let tree = doc.tree();
                for &child in &tree.get(specifier).children {
                    let foreign = scope::role(tree, child).is_some_and(Role::is_foreign);
                    if foreign && doc.text()[tree.get(child).range()] == symbol.name {
                        found.push(doc, child);
                    }
                }
                if exported_name(doc, specifier) == Some(symbol.name.as_str()) {
                    importers(store, doc, &symbol.name, &mut found);
                }
            }
        }
        found.locations
    }

    fn declarations_of(&self, store: &DocumentStore, symbol: &Symbol) -> Vec<DeclarationLocation> {
        let mut declarations = Vec::new();
        for location in self.find_reference_locations(store, symbol) {
            let Some(doc) = store.id_for_path(&location.path).and_then(|id| store.get(id)) else {
                continue;
            };
            let tree = doc.tree();
            let Some(id) = name_token_at(tree, location.span.range()) else {
                continue;
            };
            let declares = match scope::role(tree, id) {
                Some(Role::Member) => tree.get(id).field.as_deref() == Some("name"),
                Some(role) if role.is_foreign() => true,
                Some(_) => scope::is_declaration(tree, id),
                None => false,
            };
            if !declares {
                continue;
            }
            if let Some(parent) = tree.get(id).parent {
                let parent = tree.get(parent);
                declarations.push(DeclarationLocation {
                    path: doc.path().to_path_buf(),
                    kind: parent.kind.clone(),
                    range: parent.range(),
                });
            }
        }
        declarations
    }
}

/// Reference locations in discovery order, one per token.
struct Found<'n> {
    name: &'n str,
    seen: HashSet<(PathBuf, usize)>,
    visited: HashSet<PathBuf>,
    locations: Vec<ReferenceLocation>,
}

impl<'n> Found<'n> {
    fn new(name: &'n str) -> Self {
        Self {
            name,
            seen: HashSet::new(),
            visited: HashSet::new(),
            locations: Vec::new(),
        }
    }

    fn push(&mut self, doc: &Document, id: RawId) {
        let tree = doc.tree();
        let range = tree.get(id).range();
        if !self.seen.insert((doc.path().to_path_buf(), range.start)) {
            return;
        }
        let prefix = scope::is_shorthand(tree, id).then(|| format!("{}: ", self.name));
        self.locations.push(ReferenceLocation {
            path: doc.path().to_path_buf(),
            span: TextSpan::from(range),
            prefix,
        });
    }
}

fn innermost_with_range(tree: &SyntaxTree, range: Range<usize>) -> Option<RawId> {
    tree.iter()
        .filter(|(_, node)| node.start == range.start && node.end == range.end)
        .map(|(id, _)| id)
        .last()
}

fn name_token_at(tree: &SyntaxTree, range: Range<usize>) -> Option<RawId> {
    tree.iter()
        .find(|(id, node)| node.range() == range && scope::role(tree, *id).is_some())
        .map(|(id, _)| id)
}

fn text_of<'d>(doc: &'d Document, id: RawId) -> &'d str {
    &doc.text()[doc.tree().get(id).range()]
}

fn bound(doc: &Document, name: &str, origin: SymbolOrigin, at: RawId) -> Symbol {
    let node = doc.tree().get(at);
    Symbol {
        name: name.to_string(),
        origin,
        scope: Some(SymbolScope {
            path: doc.path().to_path_buf(),
            kind: node.kind.clone(),
            range: node.range(),
        }),
    }
}

fn locate_scope<'s>(store: &'s DocumentStore, at: &SymbolScope) -> Option<(&'s Document, RawId)> {
    let doc = store.id_for_path(&at.path).and_then(|id| store.get(id))?;
    let id = doc.tree().find(&at.kind, at.range.clone())?;
    Some((doc, id))
}

fn symbol_for_token(store: &DocumentStore, doc: &Document, token: RawId, hops: usize) -> Symbol {
    let tree = doc.tree();
    let name = text_of(doc, token);
    let specifier = tree.get(token).parent.unwrap_or_else(|| tree.root());
    match scope::role(tree, token) {
        Some(Role::Member) => Symbol::member(name),
        Some(Role::ImportedName | Role::ReexportedName) => imported(store, doc, token, name, hops)
            .unwrap_or_else(|| bound(doc, name, SymbolOrigin::Foreign, specifier)),
        Some(Role::ExportedAlias) => bound(doc, name, SymbolOrigin::Foreign, specifier),
        _ => {
            let scopes = FileScopes::new(tree, doc.text());
            let binding = scopes.binding_scope(token);
            if binding == tree.root() {
                if let Some(symbol) = import_binding(store, doc, name, hops) {
                    return symbol;
                }
            }
            bound(doc, name, SymbolOrigin::Local, binding)
        }
    }
}

/// The export `name` of the module imported by the statement around `token`.
fn imported(
    store: &DocumentStore,
    doc: &Document,
    token: RawId,
    name: &str,
    hops: usize,
) -> Option<Symbol> {
    if hops >= MAX_HOPS {
        return None;
    }
    let tree = doc.tree();
    let statement = scope::module_statement(tree, token)?;
    let specifier = scope::module_specifier(tree, doc.text(), statement)?;
    let target = resolve_module(store, doc.path(), specifier)?;
    export_of(store, target, name, hops + 1)
}

/// Follows `import { name } from './m'` when it binds `name` at the top level.
fn import_binding(store: &DocumentStore, doc: &Document, name: &str, hops: usize) -> Option<Symbol> {
    let tree = doc.tree();
    tree.iter()
        .filter(|(id, node)| {
            node.kind == "import_specifier" && tree.child_by_field(*id, "alias").is_none()
        })
        .filter_map(|(id, _)| tree.child_by_field(id, "name"))
        .filter(|&local| text_of(doc, local) == name)
        .find_map(|local| imported(store, doc, local, name, hops))
}

/// What `doc` exports under `name`.
fn export_of(store: &DocumentStore, doc: &Document, name: &str, hops: usize) -> Option<Symbol> {
    let tree = doc.tree();
    for (id, node) in tree.iter() {
        match node.kind.as_str() {
            "export_specifier" => {
                if exported_name(doc, id) != Some(name) {
                    continue;
                }
                return Some(match tree.child_by_field(id, "alias") {
                    Some(_) => bound(doc, name, SymbolOrigin::Foreign, id),
                    None => symbol_for_token(store, doc, tree.child_by_field(id, "name")?, hops),
                });
            }
            "export_statement" if declares(doc, id, name) => {
                return Some(bound(doc, name, SymbolOrigin::Local, tree.root()));
            }
            _ => {}
        }
    }
    None
}

/// The name importers see for an export specifier.
fn exported_name(doc: &Document, specifier: RawId) -> Option<&str> {
    let tree = doc.tree();
    if tree.get(specifier).kind != "export_specifier" {
        return None;
    }
    let exported = tree
        .child_by_field(specifier, "alias")
        .or_else(|| tree.child_by_field(specifier, "name"))?;
    Some(text_of(doc, exported))
}

/// `export function name`, `export const name = ...` and friends.
fn declares(doc: &Document, statement: RawId, name: &str) -> bool {
    let tree = doc.tree();
    let Some(declaration) = tree.child_by_field(statement, "declaration") else {
        return false;
    };
    if tree
        .child_by_field(declaration, "name")
        .is_some_and(|id| text_of(doc, id) == name)
    {
        return true;
    }
    tree.get(declaration)
        .children
        .iter()
        .filter(|&&child| tree.get(child).kind == "variable_declarator")
        .filter_map(|&child| tree.child_by_field(child, "name"))
        .any(|id| text_of(doc, id) == name)
}

/// `doc` exports its top-level binding `name` under the same name.
fn exports_directly(doc: &Document, name: &str) -> bool {
    let tree = doc.tree();
    tree.iter().any(|(id, node)| match node.kind.as_str() {
        "export_specifier" => {
            tree.child_by_field(id, "alias").is_none()
                && scope::module_statement(tree, id).is_none()
                && exported_name(doc, id) == Some(name)
        }
        "export_statement" => declares(doc, id, name),
        _ => false,
    })
}

/// Tokens in other documents that refer to `target`'s export `name`.
fn importers(store: &DocumentStore, target: &Document, name: &str, found: &mut Found<'_>) {
    if !found.visited.insert(target.path().to_path_buf()) {
        return;
    }
    let target_path = scope::normalize(target.path());

    for doc in store.iter() {
        if doc.path() == target.path() {
            continue;
        }
        let tree = doc.tree();
        let mut follow = false;
        let mut scopes = None;
        for (id, node) in tree.iter() {
            let kind = node.kind.as_str();
            if kind != "import_specifier" && kind != "export_specifier" {
                continue;
            }
            let Some(local) = tree.child_by_field(id, "name") else {
                continue;
            };
            if text_of(doc, local) != name {
                continue;
            }
            let Some(specifier) = scope::module_statement(tree, id)
                .and_then(|statement| scope::module_specifier(tree, doc.text(), statement))
            else {
                continue;
            };
            if !scope::module_candidates(doc.path(), specifier).contains(&target_path) {
                continue;
            }

            let aliased = tree.child_by_field(id, "alias").is_some();
            match (kind, aliased) {
                (_, true) => found.push(doc, local),
                ("import_specifier", false) => {
                    let scopes = scopes.get_or_insert_with(|| FileScopes::new(tree, doc.text()));
                    for token in scopes.bound_tokens(tree.root(), name) {
                        found.push(doc, token);
                    }
                    follow |= exports_directly(doc, name);
                }
                _ => {
                    found.push(doc, local);
                    follow = true;
                }
            }
        }
        if follow {
            importers(store, doc, name, found);
        }
    }
}

fn resolve_module<'s>(store: &'s DocumentStore, importer: &Path, specifier: &str) -> Option<&'s Document> {
    scope::module_candidates(importer, specifier)
        .into_iter()
        .find_map(|candidate| store.iter().find(|doc| scope::normalize(doc.path()) == candidate))
}
