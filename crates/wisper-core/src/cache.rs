//! Version-namespaced module cache
//!
//! Every installed `(name, version)` pair lives in its own directory under
//! the store: `<store>/_<safe name>@<version>@<name>`. Entries are never
//! rewritten; a newer version is installed next to the old one.

use crate::error::{Error, Result};
use crate::installer::{InstallRequest, Installer};
use crate::registry::VersionSource;
use semver::Version;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Sentinel version meaning "the newest published version"
pub const LATEST: &str = "latest";

/// A requestable command module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub version: String,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Spec pointing at the newest published version
    pub fn latest(name: impl Into<String>) -> Self {
        Self::new(name, LATEST)
    }

    pub fn is_latest(&self) -> bool {
        self.version == LATEST
    }
}

/// Filesystem-safe form of a package name (scope separator replaced)
pub fn safe_name(name: &str) -> String {
    name.replace('/', "_")
}

/// Cache entry directory for a concrete `(name, version)`
pub fn cache_entry_path(store_dir: &Path, name: &str, version: &str) -> PathBuf {
    store_dir.join(format!("_{}@{}@{}", safe_name(name), version, name))
}

/// Result of an update check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The newest published version is already cached
    UpToDate(String),
    /// A newer version was installed next to the existing one
    Installed(String),
}

/// Where a module lives and which version of it is wanted
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Root where module content lives for execution
    pub target_path: PathBuf,
    /// Root of versioned cache entries; `None` uses `target_path` directly
    pub store_dir: Option<PathBuf>,
    pub package: PackageSpec,
}

/// A single command module in the on-disk cache
pub struct ModuleCache<'a, R, I> {
    target_path: PathBuf,
    store_dir: Option<PathBuf>,
    package: PackageSpec,
    registry: &'a R,
    installer: &'a I,
    continue_on_install_error: bool,
}

impl<'a, R: VersionSource, I: Installer> ModuleCache<'a, R, I> {
    pub fn new(options: CacheOptions, registry: &'a R, installer: &'a I) -> Self {
        Self {
            target_path: options.target_path,
            store_dir: options.store_dir.filter(|dir| !dir.as_os_str().is_empty()),
            package: options.package,
            registry,
            installer,
            continue_on_install_error: true,
        }
    }

    /// Keep going with whatever is on disk when install/update fails
    pub fn continue_on_install_error(mut self, enabled: bool) -> Self {
        self.continue_on_install_error = enabled;
        self
    }

    pub fn package(&self) -> &PackageSpec {
        &self.package
    }

    /// Adopt a different concrete version (e.g. after a successful update)
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.package.version = version.into();
    }

    /// Create the store and resolve the `latest` sentinel.
    ///
    /// When the registry cannot be reached, the newest version already in the
    /// store is used instead; only with an empty store does this fail.
    pub async fn prepare(&mut self) -> Result<()> {
        if let Some(store) = &self.store_dir {
            if !store.exists() {
                fs::create_dir_all(store).await?;
            }
        }

        if self.package.is_latest() {
            let name = self.package.name.clone();
            self.package.version = match self.registry.latest_version(&name).await {
                Ok(version) => version,
                Err(err) => match self.newest_cached_version().await? {
                    Some(cached) => {
                        tracing::warn!(
                            package = %name,
                            version = %cached,
                            error = %err,
                            "registry lookup failed, falling back to cached version"
                        );
                        cached
                    }
                    None => {
                        return Err(Error::Resolution {
                            name,
                            reason: err.to_string(),
                        })
                    }
                },
            };
            tracing::debug!(package = %name, version = %self.package.version, "resolved version");
        }

        Ok(())
    }

    /// Cache entry of the held version; `None` without a store or before `prepare()`
    pub fn cache_path(&self) -> Option<PathBuf> {
        if self.package.is_latest() {
            return None;
        }
        self.cache_path_for(&self.package.version)
    }

    /// Cache entry of a specific version
    pub fn cache_path_for(&self, version: &str) -> Option<PathBuf> {
        self.store_dir
            .as_deref()
            .map(|store| cache_entry_path(store, &self.package.name, version))
    }

    /// Whether the module is present locally
    pub async fn exists(&mut self) -> Result<bool> {
        if self.store_dir.is_some() {
            self.prepare().await?;
            Ok(self.cache_path().is_some_and(|path| path.exists()))
        } else {
            Ok(self.target_path.exists())
        }
    }

    /// Install the held version through the installer
    pub async fn install(&self) -> Result<()> {
        let version = self.package.version.clone();
        self.installer
            .install(&self.request_for(&version))
            .await
            .map_err(|err| Error::install(&self.package.name, &version, err))
    }

    /// Install the newest published version if it is not cached yet.
    ///
    /// The held version is left untouched; callers that want to run the new
    /// version must `set_version` it themselves.
    pub async fn update(&mut self) -> Result<UpdateOutcome> {
        self.prepare().await?;

        let name = self.package.name.clone();
        let latest = self
            .registry
            .latest_version(&name)
            .await
            .map_err(|err| Error::update(&name, err))?;

        if self
            .cache_path_for(&latest)
            .is_some_and(|path| path.exists())
        {
            return Ok(UpdateOutcome::UpToDate(latest));
        }

        self.installer
            .install(&self.request_for(&latest))
            .await
            .map_err(|err| Error::update(&name, err))?;
        Ok(UpdateOutcome::Installed(latest))
    }

    /// Install when missing, otherwise check for a newer version.
    ///
    /// Failures are logged and swallowed unless `continue_on_install_error`
    /// has been turned off.
    pub async fn ensure_latest(&mut self) -> Result<()> {
        let result = match self.exists().await {
            Ok(false) => {
                tracing::debug!(package = %self.package.name, state = "installing");
                self.install().await
            }
            Ok(true) => {
                tracing::debug!(package = %self.package.name, state = "updating");
                self.update().await.map(|outcome| match outcome {
                    UpdateOutcome::UpToDate(version) => {
                        tracing::debug!(%version, "module is up to date")
                    }
                    UpdateOutcome::Installed(version) => {
                        tracing::info!(package = %self.package.name, %version, "installed newer version")
                    }
                })
            }
            Err(err) => Err(err),
        };

        match result {
            Err(err) if self.continue_on_install_error => {
                tracing::warn!(error = %err, "continuing with what is already on disk");
                Ok(())
            }
            other => other,
        }
    }

    /// Directory to search for the module's entry point
    pub fn entry_dir(&self) -> Option<PathBuf> {
        match &self.store_dir {
            Some(_) => self.cache_path(),
            None => Some(self.target_path.clone()),
        }
    }

    /// Newest version with an entry in the store, if any
    pub async fn newest_cached_version(&self) -> Result<Option<String>> {
        let Some(store) = &self.store_dir else {
            return Ok(None);
        };
        if !store.exists() {
            return Ok(None);
        }

        let prefix = format!("_{}@", safe_name(&self.package.name));
        let mut newest: Option<Version> = None;
        let mut entries = fs::read_dir(store).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(rest) = file_name.to_str().and_then(|n| n.strip_prefix(&prefix)) else {
                continue;
            };
            let Some((version, _)) = rest.split_once('@') else {
                continue;
            };
            let Ok(parsed) = Version::parse(version) else {
                continue;
            };
            let complete = cache_entry_path(store, &self.package.name, version).exists();
            if complete && newest.as_ref().map_or(true, |n| parsed > *n) {
                newest = Some(parsed);
            }
        }

        Ok(newest.map(|v| v.to_string()))
    }

    fn request_for(&self, version: &str) -> InstallRequest {
        InstallRequest {
            root: self.target_path.clone(),
            store_dir: self.store_dir.clone(),
            registry: self.registry.registry_url().clone(),
            packages: vec![PackageSpec::new(self.package.name.clone(), version)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeInstaller, FakeRegistry};

    const NAME: &str = "@wisper-cli/init";

    fn cache<'a>(
        store: &Path,
        version: &str,
        registry: &'a FakeRegistry,
        installer: &'a FakeInstaller,
    ) -> ModuleCache<'a, FakeRegistry, FakeInstaller> {
        ModuleCache::new(
            CacheOptions {
                target_path: store.parent().unwrap().to_path_buf(),
                store_dir: Some(store.to_path_buf()),
                package: PackageSpec::new(NAME, version),
            },
            registry,
            installer,
        )
    }

    #[test]
    fn test_cache_entry_path_format() {
        let path = cache_entry_path(Path::new("/store"), NAME, "2.1.0");
        assert_eq!(path, PathBuf::from("/store/_@wisper-cli_init@2.1.0@@wisper-cli/init"));

        let plain = cache_entry_path(Path::new("/store"), "wisper-init", "1.0.0");
        assert_eq!(plain, PathBuf::from("/store/_wisper-init@1.0.0@wisper-init"));
    }

    #[test]
    fn test_cache_entry_path_deterministic_and_distinct() {
        let store = Path::new("/store");
        assert_eq!(
            cache_entry_path(store, NAME, "1.0.0"),
            cache_entry_path(store, NAME, "1.0.0")
        );
        assert_ne!(
            cache_entry_path(store, NAME, "1.0.0"),
            cache_entry_path(store, NAME, "1.0.1")
        );
    }

    #[tokio::test]
    async fn test_prepare_resolves_latest_and_creates_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("deps/node_modules");
        let registry = FakeRegistry::with_latest("2.1.0");
        let installer = FakeInstaller::default();
        let mut cache = cache(&store, LATEST, &registry, &installer);

        assert!(cache.cache_path().is_none());
        cache.prepare().await.unwrap();

        assert!(store.exists());
        assert_eq!(cache.package().version, "2.1.0");
        assert_eq!(cache.cache_path(), Some(cache_entry_path(&store, NAME, "2.1.0")));

        // second call keeps the resolved version
        cache.prepare().await.unwrap();
        assert_eq!(cache.package().version, "2.1.0");
    }

    #[tokio::test]
    async fn test_exists_false_before_install_true_after() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("node_modules");
        let registry = FakeRegistry::with_latest("2.1.0");
        let installer = FakeInstaller::default();
        let mut cache = cache(&store, "2.1.0", &registry, &installer);

        assert!(!cache.exists().await.unwrap());
        cache.install().await.unwrap();
        assert!(cache.exists().await.unwrap());

        let calls = installer.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].packages, vec![PackageSpec::new(NAME, "2.1.0")]);
        assert_eq!(calls[0].store_dir.as_deref(), Some(store.as_path()));
        assert_eq!(calls[0].registry.as_str(), "https://registry.example/");
    }

    #[tokio::test]
    async fn test_exists_without_store_checks_target() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FakeRegistry::with_latest("2.1.0");
        let installer = FakeInstaller::default();
        let mut cache = ModuleCache::new(
            CacheOptions {
                target_path: dir.path().join("missing"),
                store_dir: None,
                package: PackageSpec::latest(NAME),
            },
            &registry,
            &installer,
        );

        assert!(!cache.exists().await.unwrap());
        // no store means no version resolution
        assert_eq!(registry.lookups(), 0);
        assert_eq!(cache.entry_dir(), Some(dir.path().join("missing")));
    }

    #[tokio::test]
    async fn test_update_is_noop_when_latest_cached() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("node_modules");
        let registry = FakeRegistry::with_latest("2.1.0");
        let installer = FakeInstaller::default();
        installer.preinstall(&store, NAME, "2.1.0", Some("lib/index.js"));

        let mut cache = cache(&store, "2.1.0", &registry, &installer);
        let outcome = cache.update().await.unwrap();

        assert_eq!(outcome, UpdateOutcome::UpToDate("2.1.0".to_string()));
        assert!(installer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_installs_newer_version_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("node_modules");
        let registry = FakeRegistry::with_latest("1.1.0");
        let installer = FakeInstaller::default();
        installer.preinstall(&store, NAME, "1.0.0", Some("lib/index.js"));

        let mut cache = cache(&store, "1.0.0", &registry, &installer);
        let outcome = cache.update().await.unwrap();

        assert_eq!(outcome, UpdateOutcome::Installed("1.1.0".to_string()));
        let calls = installer.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].packages, vec![PackageSpec::new(NAME, "1.1.0")]);

        // the held version is not swapped
        assert_eq!(cache.package().version, "1.0.0");
        assert!(cache_entry_path(&store, NAME, "1.0.0").exists());
        assert!(cache_entry_path(&store, NAME, "1.1.0").exists());

        cache.set_version("1.1.0");
        assert_eq!(
            cache.entry_dir(),
            Some(cache_entry_path(&store, NAME, "1.1.0"))
        );
        assert!(cache.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_prepare_falls_back_to_newest_cached_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("node_modules");
        let registry = FakeRegistry::unreachable();
        let installer = FakeInstaller::default();
        installer.preinstall(&store, NAME, "1.2.0", Some("lib/index.js"));
        installer.preinstall(&store, NAME, "1.10.0", Some("lib/index.js"));
        installer.preinstall(&store, "other", "9.0.0", Some("index.js"));

        let mut cache = cache(&store, LATEST, &registry, &installer);
        cache.prepare().await.unwrap();

        assert_eq!(cache.package().version, "1.10.0");
    }

    #[tokio::test]
    async fn test_prepare_fails_without_registry_or_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("node_modules");
        let registry = FakeRegistry::unreachable();
        let installer = FakeInstaller::default();

        let mut cache = cache(&store, LATEST, &registry, &installer);
        let err = cache.prepare().await.unwrap_err();

        assert!(matches!(err, Error::Resolution { .. }));
        assert!(cache.entry_dir().is_none());
    }

    #[tokio::test]
    async fn test_ensure_latest_swallows_failures_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("node_modules");
        let registry = FakeRegistry::with_latest("2.1.0");
        let installer = FakeInstaller::failing();

        let mut cache = cache(&store, LATEST, &registry, &installer);
        cache.ensure_latest().await.unwrap();
        assert_eq!(installer.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_latest_strict_policy_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("node_modules");
        let registry = FakeRegistry::with_latest("2.1.0");
        let installer = FakeInstaller::failing();

        let mut cache =
            cache(&store, LATEST, &registry, &installer).continue_on_install_error(false);
        let err = cache.ensure_latest().await.unwrap_err();
        assert!(matches!(err, Error::Install { .. }));
    }
}
