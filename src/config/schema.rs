use crate::ts::Grammar;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Project-wide formatting and parsing settings.
///
/// Loaded from `treemorph.toml`; every field has a default so an empty file
/// is valid.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// One level of indentation for inserted members.
    pub indentation: String,
    pub newline: NewlineKind,
    /// Refuse edits whose result has parse errors the old text did not have.
    pub reject_syntax_errors: bool,
    /// Extension (without the dot) to grammar overrides.
    pub extensions: BTreeMap<String, Grammar>,
    /// Grammar for files no extension mapping recognises.
    pub fallback_grammar: Option<Grammar>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            indentation: "    ".to_string(),
            newline: NewlineKind::Lf,
            reject_syntax_errors: false,
            extensions: BTreeMap::new(),
            fallback_grammar: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.indentation.is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "indentation",
            });
        } else if !self.indentation.chars().all(|c| c == ' ' || c == '\t') {
            issues.push(ValidationIssue::InvalidValue {
                field: "indentation".to_string(),
                message: "only spaces and tabs are allowed".to_string(),
            });
        }

        for ext in self.extensions.keys() {
            if ext.trim().is_empty() {
                issues.push(ValidationIssue::InvalidValue {
                    field: "extensions".to_string(),
                    message: "extension must not be empty".to_string(),
                });
            } else if ext.starts_with('.') {
                issues.push(ValidationIssue::InvalidValue {
                    field: format!("extensions.{ext}"),
                    message: "write the extension without the leading dot".to_string(),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Newline sequence for inserted text.
    pub fn newline_str(&self) -> &'static str {
        self.newline.as_str()
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NewlineKind {
    #[default]
    Lf,
    Crlf,
}

impl NewlineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NewlineKind::Lf => "\n",
            NewlineKind::Crlf => "\r\n",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    MissingField { field: &'static str },
    InvalidValue { field: String, message: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => {
                write!(f, "settings missing required field '{field}'")
            }
            ValidationIssue::InvalidValue { field, message } => {
                write!(f, "settings field '{field}' is invalid: {message}")
            }
        }
    }
}
