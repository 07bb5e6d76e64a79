use crate::syntax::{NodeSpec, RawId, SyntaxTree, SyntaxTreeBuilder};
use crate::ts::errors::TreeSitterError;
use ast_grep_language::{LanguageExt, SupportLang};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tree_sitter::{Parser, Tree};

/// Grammars the tree-sitter oracle knows how to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Grammar {
    Rust,
    TypeScript,
    Tsx,
    JavaScript,
}

impl Grammar {
    /// Parse a grammar from its configuration name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rust" => Some(Grammar::Rust),
            "typescript" => Some(Grammar::TypeScript),
            "tsx" => Some(Grammar::Tsx),
            "javascript" => Some(Grammar::JavaScript),
            _ => None,
        }
    }

    /// Default grammar for a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "rs" => Some(Grammar::Rust),
            "ts" | "mts" | "cts" => Some(Grammar::TypeScript),
            "tsx" => Some(Grammar::Tsx),
            "js" | "mjs" | "cjs" | "jsx" => Some(Grammar::JavaScript),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn name(self) -> &'static str {
        match self {
            Grammar::Rust => "rust",
            Grammar::TypeScript => "typescript",
            Grammar::Tsx => "tsx",
            Grammar::JavaScript => "javascript",
        }
    }

    pub fn support_lang(self) -> SupportLang {
        match self {
            Grammar::Rust => SupportLang::Rust,
            Grammar::TypeScript => SupportLang::TypeScript,
            Grammar::Tsx => SupportLang::Tsx,
            Grammar::JavaScript => SupportLang::JavaScript,
        }
    }
}

/// Tree-sitter parser wrapper for one grammar.
pub struct LanguageParser {
    parser: Parser,
    grammar: Grammar,
}

impl LanguageParser {
    pub fn new(grammar: Grammar) -> Result<Self, TreeSitterError> {
        let mut parser = Parser::new();
        // Get the tree-sitter Language from ast-grep-language
        let ts_lang = grammar.support_lang().get_ts_language();
        parser
            .set_language(&ts_lang)
            .map_err(|_| TreeSitterError::LanguageSet {
                language: grammar.name().to_string(),
            })?;

        Ok(Self { parser, grammar })
    }

    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    /// Parse source code into a tree-sitter Tree.
    pub fn parse(&mut self, source: &str) -> Result<Tree, TreeSitterError> {
        self.parser
            .parse(source, None)
            .ok_or(TreeSitterError::ParseFailed)
    }

    /// Parse source code into an owned [`SyntaxTree`].
    pub fn parse_syntax(&mut self, source: &str) -> Result<SyntaxTree, TreeSitterError> {
        let tree = self.parse(source)?;
        Ok(to_syntax_tree(&tree, source.len()))
    }
}

/// Flatten a tree-sitter tree, tokens and extras included.
pub fn to_syntax_tree(tree: &Tree, text_len: usize) -> SyntaxTree {
    let mut builder = SyntaxTreeBuilder::new();
    push_node(&mut builder, tree.root_node(), None, None);
    builder.finish(text_len)
}

fn push_node(
    builder: &mut SyntaxTreeBuilder,
    node: tree_sitter::Node<'_>,
    field: Option<&str>,
    parent: Option<RawId>,
) {
    let mut spec = NodeSpec::named(node.kind(), node.byte_range())
        .with_error(node.is_error() || node.is_missing());
    spec.named = node.is_named();
    if let Some(field) = field {
        spec = spec.with_field(field);
    }
    let id = builder.push(parent, spec);

    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            push_node(builder, cursor.node(), cursor.field_name(), Some(id));
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
}
