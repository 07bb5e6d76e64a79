use crate::config::schema::{Settings, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up by [`discover`].
pub const SETTINGS_FILE: &str = "treemorph.toml";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read settings from {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse settings TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse settings TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid settings ({}): {}", path.display(), source),
                None => write!(f, "invalid settings: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    settings
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(settings)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// Load the nearest `treemorph.toml` at or above `start`.
///
/// Returns `Ok(None)` when no settings file exists up to the filesystem root.
pub fn discover(start: impl AsRef<Path>) -> Result<Option<(PathBuf, Settings)>, ConfigError> {
    for dir in start.as_ref().ancestors() {
        let candidate = dir.join(SETTINGS_FILE);
        if candidate.is_file() {
            log::debug!("using settings from {}", candidate.display());
            let settings = load_from_path(&candidate)?;
            return Ok(Some((candidate, settings)));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NewlineKind;
    use crate::ts::Grammar;

    #[test]
    fn empty_input_yields_defaults() {
        let settings = load_from_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.indentation, "    ");
    }

    #[test]
    fn parses_all_fields() {
        let settings = load_from_str(
            r#"
indentation = "\t"
newline = "crlf"
reject_syntax_errors = true
fallback_grammar = "typescript"

[extensions]
mts = "typescript"
"#,
        )
        .unwrap();

        assert_eq!(settings.indentation, "\t");
        assert_eq!(settings.newline, NewlineKind::Crlf);
        assert_eq!(settings.newline_str(), "\r\n");
        assert!(settings.reject_syntax_errors);
        assert_eq!(settings.fallback_grammar, Some(Grammar::TypeScript));
        assert_eq!(settings.extensions.get("mts"), Some(&Grammar::TypeScript));
    }

    #[test]
    fn unknown_key_is_a_toml_error() {
        let err = load_from_str("indent = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Toml { path: None, .. }));
    }

    #[test]
    fn invalid_values_are_collected() {
        let err = load_from_str(
            r#"
indentation = "--"
[extensions]
".ts" = "typescript"
"#,
        )
        .unwrap_err();

        match err {
            ConfigError::Validation { source, .. } => assert_eq!(source.issues.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn errors_from_files_carry_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "indentation = \"\"").unwrap();

        let err = load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains(SETTINGS_FILE));
    }

    #[test]
    fn discover_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), "newline = \"crlf\"").unwrap();
        let nested = dir.path().join("src/deep");
        fs::create_dir_all(&nested).unwrap();

        let (found, settings) = discover(&nested).unwrap().unwrap();
        assert_eq!(found, dir.path().join(SETTINGS_FILE));
        assert_eq!(settings.newline, NewlineKind::Crlf);
    }
}
