pub mod loader;
pub mod schema;

pub use loader::{discover, load_from_path, load_from_str, ConfigError, SETTINGS_FILE};
pub use schema::{NewlineKind, Settings, ValidationError, ValidationIssue};
