use crate::cache::NodeId;
use crate::config::ConfigError;
use crate::edit::EditError;
use crate::oracle::OracleError;
use crate::validate::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

/// Every failure a [`crate::Project`] operation can report.
#[derive(Error, Debug)]
pub enum MorphError {
    #[error(transparent)]
    Edit(#[from] EditError),

    #[error("{what} not found{}", suggestion.as_ref().map(|s| format!(" (did you mean `{s}`?)")).unwrap_or_default())]
    NotFound {
        what: String,
        suggestion: Option<String>,
    },

    #[error("Node {node} was forgotten by an earlier edit")]
    ForgottenNode { node: NodeId },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl MorphError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        MorphError::NotFound {
            what: what.into(),
            suggestion: None,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        MorphError::InvalidOperation {
            message: message.into(),
        }
    }
}

pub type Result<T, E = MorphError> = std::result::Result<T, E>;
