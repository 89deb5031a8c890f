//! Runtime configuration
//!
//! Built once at startup and threaded into the dispatcher. Values are looked
//! up in the process environment first, then in `~/.env`, then fall back to
//! the product defaults.

use crate::error::{Error, Result};
use crate::product::ProductConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use url::Url;

/// Directory under the CLI home holding installed command modules
pub const CACHE_DIR: &str = "dependencies";

/// Environment variable selecting the log level (`verbose` enables debug output)
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Settings supplied on the command line, which win over the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub debug: bool,
    pub target_path: Option<PathBuf>,
}

/// Resolved configuration for one CLI invocation
#[derive(Debug, Clone)]
pub struct Config {
    /// The user's home directory
    pub user_home: PathBuf,
    /// Root of the CLI's own state (`~/.wisper-cli` by default)
    pub home_path: PathBuf,
    /// Explicit location of a command module, bypassing the shared cache
    pub target_path: Option<PathBuf>,
    /// Registry used for version lookups and installs
    pub registry: Url,
    pub debug: bool,
    /// Keep dispatching from whatever is on disk when install/update fails
    pub continue_on_install_error: bool,
}

impl Config {
    /// Load configuration for `product` from the real environment
    pub fn load<C: ProductConfig>(product: &C, overrides: Overrides) -> Result<Self> {
        let user_home = dirs::home_dir()
            .filter(|home| home.exists())
            .ok_or_else(|| Error::Config("user home directory does not exist".to_string()))?;

        let env_file = read_env_file(&user_home.join(".env"));
        let lookup = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|value| !value.is_empty())
                .or_else(|| env_file.get(key).cloned())
        };

        Self::resolve(product, user_home, lookup, overrides)
    }

    /// Assemble a configuration from an arbitrary key lookup
    pub fn resolve<C, F>(
        product: &C,
        user_home: PathBuf,
        lookup: F,
        overrides: Overrides,
    ) -> Result<Self>
    where
        C: ProductConfig,
        F: Fn(&str) -> Option<String>,
    {
        let home_dir =
            lookup(product.home_dir_env()).unwrap_or_else(|| product.default_home_dir().to_string());
        let home_path = user_home.join(home_dir);

        let target_path = overrides
            .target_path
            .or_else(|| lookup(product.target_path_env()).map(PathBuf::from));

        let registry_str = lookup(product.registry_url_env())
            .unwrap_or_else(|| product.default_registry_url().to_string());
        let registry = Url::parse(&registry_str)
            .map_err(|e| Error::Config(format!("invalid registry URL '{}': {}", registry_str, e)))?;

        let debug = overrides.debug
            || lookup(LOG_LEVEL_ENV).is_some_and(|level| level.eq_ignore_ascii_case("verbose"));

        Ok(Self {
            user_home,
            home_path,
            target_path,
            registry,
            debug,
            continue_on_install_error: true,
        })
    }

    /// Root directory handed to the installer
    pub fn cache_root(&self) -> PathBuf {
        self.home_path.join(CACHE_DIR)
    }

    /// Directory holding version-qualified cache entries
    pub fn store_dir(&self) -> PathBuf {
        self.cache_root().join("node_modules")
    }
}

/// Read `KEY=VALUE` pairs from a dotenv-style file.
///
/// A missing or unreadable file is empty; invalid UTF-8 is decoded lossily.
pub fn read_env_file(path: &Path) -> HashMap<String, String> {
    if !path.exists() {
        return HashMap::new();
    }
    match std::fs::read(path) {
        Ok(bytes) => parse_env(&String::from_utf8_lossy(&bytes)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable env file");
            HashMap::new()
        }
    }
}

fn parse_env(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            Some((key.trim().to_string(), value.to_string()))
        })
        .collect()
}
