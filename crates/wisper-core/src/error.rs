//! Error taxonomy for resolving and dispatching command modules

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for wisper operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration could not be assembled (e.g. no user home directory)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The requested command has no registered package
    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    /// The registry could not produce a concrete version and nothing is cached
    #[error("Failed to resolve the latest version of {name}: {reason}")]
    Resolution { name: String, reason: String },

    /// The registry answered, but not with what we asked for
    #[error("Registry error: {0}")]
    Registry(String),

    /// The package does not exist in the registry
    #[error("Package '{0}' not found in registry")]
    NotFound(String),

    #[error("Failed to install {name}@{version}: {source}")]
    Install {
        name: String,
        version: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to update {name}: {source}")]
    Update {
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// No package descriptor or no `main` field after install/update
    #[error("No runnable entry point found for {package} in {}", .dir.display())]
    EntryPointMissing { package: String, dir: PathBuf },

    /// The child process could not be launched
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command '{command}' is not allowed (allowed: {allowed})")]
    CommandNotAllowed { command: String, allowed: String },

    #[error("Failed to extract package archive: {0}")]
    Extract(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    pub fn extract(msg: impl Into<String>) -> Self {
        Self::Extract(msg.into())
    }

    pub(crate) fn install(name: &str, version: &str, source: Error) -> Self {
        Self::Install {
            name: name.to_string(),
            version: version.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn update(name: &str, source: Error) -> Self {
        Self::Update {
            name: name.to_string(),
            source: Box::new(source),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;
