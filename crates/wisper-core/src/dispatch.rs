//! Turning a command name into a running command module
//!
//! One dispatch walks `resolving -> (installing | updating) -> locating ->
//! launching` and returns the exit code of the launched module. Installing
//! and updating are best effort; command lookup, entry-point resolution and
//! spawning are not.

use crate::args;
use crate::cache::{CacheOptions, ModuleCache, PackageSpec};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::installer::Installer;
use crate::launch::{InvocationRequest, Launcher};
use crate::locator;
use crate::product::ProductConfig;
use crate::registry::VersionSource;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// A parsed command as received from the CLI front-end
#[derive(Debug, Clone, Default)]
pub struct DispatchRequest {
    /// Registered command name (e.g. `init`)
    pub command: String,
    /// Positional arguments in declaration order
    pub positionals: Vec<Value>,
    /// Command object: options plus internal `_`-prefixed fields and `parent`
    pub command_object: Map<String, Value>,
}

/// Resolves, installs and launches command modules
pub struct Dispatcher<C, R, I, L> {
    product: C,
    config: Config,
    registry: R,
    installer: I,
    launcher: L,
    cwd: PathBuf,
}

impl<C, R, I, L> Dispatcher<C, R, I, L>
where
    C: ProductConfig,
    R: VersionSource,
    I: Installer,
    L: Launcher,
{
    pub fn new(product: C, config: Config, registry: R, installer: I, launcher: L) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            product,
            config,
            registry,
            installer,
            launcher,
            cwd,
        }
    }

    /// Working directory handed to the launched module
    pub fn with_cwd(mut self, cwd: PathBuf) -> Self {
        self.cwd = cwd;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn installer(&self) -> &I {
        &self.installer
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Run `request` and return the module's exit code
    pub async fn dispatch(&self, request: &DispatchRequest) -> Result<i32> {
        tracing::debug!(command = %request.command, state = "resolving");
        let package = self
            .product
            .package_for(&request.command)
            .ok_or_else(|| Error::UnknownCommand(request.command.clone()))?;

        let entry_dir = self.prepare_module(package).await?;

        tracing::debug!(dir = %entry_dir.display(), state = "locating");
        let entry_path =
            locator::root_file_path(&entry_dir).ok_or_else(|| Error::EntryPointMissing {
                package: package.to_string(),
                dir: entry_dir.clone(),
            })?;

        let invocation = InvocationRequest::new(
            entry_path,
            args::payload(request.positionals.clone(), &request.command_object),
        )
        .verbose(self.config.debug);
        tracing::debug!(entry = %invocation.entry_path, mode = ?invocation.mode(), state = "launching");

        self.launcher.launch(&invocation, &self.cwd).await
    }

    /// Make sure the module is on disk and return the directory to search
    async fn prepare_module(&self, package: &str) -> Result<PathBuf> {
        if let Some(target) = &self.config.target_path {
            tracing::debug!(target = %target.display(), "using explicit target path");
            return Ok(target.clone());
        }

        let store_dir = self.config.store_dir();
        tracing::debug!(target = %self.config.cache_root().display(), store = %store_dir.display());

        let mut cache = ModuleCache::new(
            CacheOptions {
                target_path: self.config.cache_root(),
                store_dir: Some(store_dir.clone()),
                package: PackageSpec::latest(package),
            },
            &self.registry,
            &self.installer,
        )
        .continue_on_install_error(self.config.continue_on_install_error);

        cache.ensure_latest().await?;

        cache.entry_dir().ok_or(Error::EntryPointMissing {
            package: package.to_string(),
            dir: store_dir,
        })
    }
}
