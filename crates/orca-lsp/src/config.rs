//! Server configuration.

use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable naming the default library root.
pub const LIBRARY_PATH_ENV: &str = "ORCA_LIBRARY_PATH";

/// Directory searched next to the executable when no library path is set.
pub const STDLIB_DIR: &str = "stdlib";

/// Settings read from the client's `initializationOptions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Library root used when no `orca-library.toml` is found above a document.
    pub library_path: Option<PathBuf>,
    /// A `tracing` filter directive, e.g. `orca_lsp=debug`.
    pub log_level: Option<String>,
}

impl ServerConfig {
    /// Read the configuration from `initializationOptions`, falling back to
    /// the environment for unset fields.
    ///
    /// Malformed options are logged and ignored.
    pub fn from_initialization_options(options: Option<&serde_json::Value>) -> Self {
        let mut config = match options {
            Some(value) if !value.is_null() => match Self::deserialize(value) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Ignoring invalid initialization options: {}", e);
                    Self::default()
                }
            },
            _ => Self::default(),
        };
        if config.library_path.is_none() {
            config.library_path = std::env::var_os(LIBRARY_PATH_ENV).map(PathBuf::from);
        }
        config
    }

    /// The library root used for documents outside any marked library.
    ///
    /// A configured path is always used, even if it does not exist, so that a
    /// misconfiguration surfaces as an error. The `stdlib` directory next to
    /// the executable is only used when present.
    pub fn default_library_root(&self) -> Option<PathBuf> {
        if let Some(path) = &self.library_path {
            return Some(std::fs::canonicalize(path).unwrap_or_else(|_| path.clone()));
        }
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))?;
        let stdlib = exe_dir.join(STDLIB_DIR);
        stdlib
            .is_dir()
            .then(|| std::fs::canonicalize(&stdlib).unwrap_or(stdlib))
    }
}
