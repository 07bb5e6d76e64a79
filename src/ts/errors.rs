use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeSitterError {
    #[error("failed to initialize tree-sitter parser")]
    ParserInit,

    #[error("failed to set language {language} for parser")]
    LanguageSet { language: String },

    #[error("failed to parse source code")]
    ParseFailed,

    #[error("invalid ast-grep pattern: {message}")]
    InvalidPattern { message: String },
}
