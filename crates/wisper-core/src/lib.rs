//! Wisper Core - module resolution and dispatch for the wisper CLI
//!
//! Every wisper command is implemented by an independently published
//! command module. This library maps a command name to its package, keeps
//! a version-namespaced cache of installed modules, installs or upgrades
//! them on demand, finds the entry point an installed module declares and
//! runs it in a child process with the user's arguments.
//!
//! # Architecture
//!
//! Leaf-first:
//!
//! - [`registry`] - newest published version of a package, tarball URLs
//! - [`cache`] - version-qualified cache entries, `exists` / `install` / `update`
//! - [`installer`] - downloads and extracts published tarballs
//! - [`locator`] - finds the package descriptor and its `main` entry
//! - [`launch`] - builds the child command line and runs it
//! - [`dispatch`] - orchestrates all of the above for one command
//!
//! [`policy`] guards the package-manager commands command modules may run,
//! and [`version`] / [`runtime`] back the CLI's startup checks.
//!
//! # Example Usage
//!
//! ```ignore
//! use wisper_core::{Config, Dispatcher, ProcessLauncher, RegistryClient, TarballInstaller};
//!
//! let config = Config::load(&product, overrides)?;
//! let registry = RegistryClient::new(config.registry.clone(), product.user_agent())?;
//! let dispatcher = Dispatcher::new(
//!     product,
//!     config,
//!     registry,
//!     TarballInstaller::new("wisper"),
//!     ProcessLauncher,
//! );
//! let code = dispatcher.dispatch(&request).await?;
//! ```

pub mod args;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod installer;
pub mod launch;
pub mod locator;
pub mod policy;
pub mod product;
pub mod registry;
pub mod runtime;
pub mod version;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use cache::{ModuleCache, PackageSpec, UpdateOutcome, LATEST};
pub use config::{Config, Overrides};
pub use dispatch::{DispatchRequest, Dispatcher};
pub use error::{Error, Result};
pub use installer::{InstallRequest, Installer, TarballInstaller};
pub use launch::{InvocationRequest, LaunchMode, Launcher, ProcessLauncher, ARGS_FLAG};
pub use policy::CommandPolicy;
pub use product::ProductConfig;
pub use registry::{RegistryClient, VersionSource};
