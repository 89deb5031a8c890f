//! Product configuration trait for CLI binaries
//!
//! This trait defines the identity of a CLI product built on this library:
//! its names, the environment keys it reads, the registry it installs from
//! and the static table mapping command names to command-module packages.

/// Configuration trait for CLI products
pub trait ProductConfig: Clone + Send + Sync + 'static {
    /// Internal product name (used in log headings)
    fn name(&self) -> &'static str;

    /// Published package name of the CLI itself (for the self-update check)
    fn package_name(&self) -> &'static str;

    /// Static table of `command name -> command-module package name`
    fn commands(&self) -> &'static [(&'static str, &'static str)];

    /// Default registry base URL
    fn default_registry_url(&self) -> &'static str;

    /// Environment variable name for overriding the registry URL
    fn registry_url_env(&self) -> &'static str;

    /// Directory name under the user home holding the CLI's state
    fn default_home_dir(&self) -> &'static str;

    /// Environment variable name for overriding the home directory name
    fn home_dir_env(&self) -> &'static str {
        "CLI_HOME"
    }

    /// Environment variable name carrying an explicit target path override
    fn target_path_env(&self) -> &'static str {
        "CLI_TARGET_PATH"
    }

    /// Lowest Node.js version able to run JavaScript command modules
    fn lowest_node_version(&self) -> &'static str {
        "12.0.0"
    }

    /// Upgrade/install command shown in version warnings
    fn upgrade_command(&self) -> &'static str;

    /// User agent string for HTTP requests
    fn user_agent(&self) -> &'static str {
        self.name()
    }

    /// Look up the package implementing `command`
    fn package_for(&self, command: &str) -> Option<&'static str> {
        self.commands()
            .iter()
            .find(|(name, _)| *name == command)
            .map(|(_, package)| *package)
    }
}
