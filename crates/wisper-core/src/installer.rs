//! Installing command modules into the cache
//!
//! Modules are published as gzipped tarballs whose entries sit under a single
//! top-level directory (`package/` for npm). Extraction happens in a temp
//! directory next to the destination, which is then renamed into place, so
//! an interrupted install never leaves a half-written cache entry behind.

use crate::cache::{cache_entry_path, PackageSpec};
use crate::error::{Error, Result};
use crate::registry::{self, RegistryClient};
use flate2::read::GzDecoder;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tar::Archive;
use url::Url;

/// Maximum tarball size (100 MB)
pub const MAX_TARBALL_SIZE: u64 = 100 * 1024 * 1024;

/// Download timeout
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything an installer needs to materialize a set of packages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// Root directory the packages are installed for
    pub root: PathBuf,
    /// Versioned store; without one packages go to `root/node_modules/<name>`
    pub store_dir: Option<PathBuf>,
    pub registry: Url,
    pub packages: Vec<PackageSpec>,
}

impl InstallRequest {
    /// Final directory for a package at a concrete version
    pub fn destination(&self, name: &str, version: &str) -> PathBuf {
        match &self.store_dir {
            Some(store) => cache_entry_path(store, name, version),
            None => self.root.join("node_modules").join(name),
        }
    }
}

/// Something that can put packages on disk
pub trait Installer: Send + Sync {
    fn install(&self, request: &InstallRequest) -> impl Future<Output = Result<()>> + Send;
}

/// Installs packages by downloading their registry tarballs
#[derive(Debug, Clone)]
pub struct TarballInstaller {
    user_agent: String,
}

impl TarballInstaller {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }

    async fn install_one(
        &self,
        client: &RegistryClient,
        request: &InstallRequest,
        spec: &PackageSpec,
    ) -> Result<()> {
        let packument = client.fetch_packument(&spec.name).await?;

        let version = if spec.is_latest() {
            registry::highest_version(&registry::published_versions(&packument))
                .map(|v| v.to_string())
                .ok_or_else(|| Error::Resolution {
                    name: spec.name.clone(),
                    reason: "registry lists no published versions".to_string(),
                })?
        } else {
            spec.version.clone()
        };

        let dest = request.destination(&spec.name, &version);
        if dest.exists() {
            tracing::debug!(package = %spec.name, %version, "already installed");
            return Ok(());
        }

        let url = registry::tarball_url(&packument, &version).ok_or_else(|| {
            Error::registry(format!("{}@{} has no tarball in the registry", spec.name, version))
        })?;

        tracing::info!(package = %spec.name, %version, "downloading");
        let bytes = download_tarball(client, url).await?;
        extract_in_background(bytes, dest.clone()).await?;
        tracing::debug!(path = %dest.display(), "installed");

        Ok(())
    }
}

impl Installer for TarballInstaller {
    async fn install(&self, request: &InstallRequest) -> Result<()> {
        let client = RegistryClient::new(request.registry.clone(), &self.user_agent)?;
        for spec in &request.packages {
            self.install_one(&client, request, spec).await?;
        }
        Ok(())
    }
}

/// Download a tarball, enforcing the size limit
async fn download_tarball(client: &RegistryClient, url: &str) -> Result<Vec<u8>> {
    let response = client
        .http()
        .get(url)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(Error::registry(format!(
            "Download failed with HTTP {} for {}",
            response.status(),
            url
        )));
    }

    if let Some(len) = response.content_length() {
        if len > MAX_TARBALL_SIZE {
            return Err(Error::registry(format!(
                "Tarball too large: {} bytes (max: {})",
                len, MAX_TARBALL_SIZE
            )));
        }
    }

    let bytes = response.bytes().await?;
    if bytes.len() as u64 > MAX_TARBALL_SIZE {
        return Err(Error::registry(format!(
            "Tarball too large: {} bytes (max: {})",
            bytes.len(),
            MAX_TARBALL_SIZE
        )));
    }

    Ok(bytes.to_vec())
}

/// Run `extract_tgz_atomic` on the blocking thread pool
async fn extract_in_background(bytes: Vec<u8>, dest: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || extract_tgz_atomic(&bytes, &dest))
        .await
        .map_err(|e| Error::extract(format!("extraction task failed: {}", e)))?
}

/// Extract a gzipped tarball into `dest`.
///
/// An existing `dest` counts as success, which also covers a concurrent
/// install of the same version winning the rename.
pub fn extract_tgz_atomic(bytes: &[u8], dest: &Path) -> Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| Error::extract("destination has no parent directory"))?;
    fs::create_dir_all(parent)?;

    if dest.exists() {
        return Ok(());
    }

    let temp_dir = parent.join(format!(".tmp-{}-{}", std::process::id(), unique_suffix()));
    if temp_dir.exists() {
        let _ = fs::remove_dir_all(&temp_dir);
    }
    fs::create_dir_all(&temp_dir)?;

    let result = unpack(bytes, &temp_dir)
        .and_then(|_| find_extracted_root(&temp_dir))
        .and_then(|root| match fs::rename(&root, dest) {
            Ok(()) => Ok(()),
            Err(_) if dest.exists() => Ok(()),
            Err(e) => Err(Error::extract(format!(
                "failed to move package into {}: {}",
                dest.display(),
                e
            ))),
        });

    let _ = fs::remove_dir_all(&temp_dir);
    result
}

fn unpack(bytes: &[u8], into: &Path) -> Result<()> {
    let mut archive = Archive::new(GzDecoder::new(bytes));
    archive
        .unpack(into)
        .map_err(|e| Error::extract(format!("invalid package tarball: {}", e)))
}

/// The single top-level directory of an extracted tarball
fn find_extracted_root(dir: &Path) -> Result<PathBuf> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }

    let package = dir.join("package");
    if package.is_dir() {
        return Ok(package);
    }
    match dirs.as_slice() {
        [only] => Ok(only.clone()),
        [] => Err(Error::extract("tarball contains no package directory")),
        _ => Err(Error::extract("tarball has more than one top-level directory")),
    }
}

fn unique_suffix() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn build_tgz(root: &str, files: &[(&str, &str)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("{}/{}", root, path), content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_extract_places_package_contents() {
        let dir = tempfile::tempdir().unwrap();
        let dest = cache_entry_path(dir.path(), "@wisper-cli/init", "2.1.0");
        let tgz = build_tgz(
            "package",
            &[
                ("package.json", r#"{"name":"@wisper-cli/init","main":"lib/index.js"}"#),
                ("lib/index.js", "module.exports = () => {}"),
            ],
        );

        extract_tgz_atomic(&tgz, &dest).unwrap();

        assert!(dest.join("package.json").exists());
        assert!(dest.join("lib/index.js").exists());
        // no temp directories are left next to the entry
        let leftovers: Vec<_> = fs::read_dir(dest.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_extract_off_the_async_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let dest = cache_entry_path(dir.path(), "@wisper-cli/init", "2.1.0");
        let tgz = build_tgz("package", &[("package.json", "{}")]);

        extract_in_background(tgz, dest.clone()).await.unwrap();
        assert!(dest.join("package.json").exists());

        let err = extract_in_background(b"not gzip".to_vec(), dir.path().join("bad"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extract(_)));
    }

    #[test]
    fn test_extract_accepts_non_standard_root() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("store/_node@1.0.0@node");
        let tgz = build_tgz("node", &[("package.json", "{}")]);

        extract_tgz_atomic(&tgz, &dest).unwrap();
        assert!(dest.join("package.json").exists());
    }

    #[test]
    fn test_extract_existing_destination_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("entry");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("marker"), "old").unwrap();

        let tgz = build_tgz("package", &[("package.json", "{}")]);
        extract_tgz_atomic(&tgz, &dest).unwrap();

        assert_eq!(fs::read_to_string(dest.join("marker")).unwrap(), "old");
        assert!(!dest.join("package.json").exists());
    }

    #[test]
    fn test_extract_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("entry");

        let err = extract_tgz_atomic(b"definitely not gzip", &dest).unwrap_err();
        assert!(matches!(err, Error::Extract(_)));
        assert!(!dest.exists());
    }

    #[test]
    fn test_request_destination() {
        let with_store = InstallRequest {
            root: PathBuf::from("/deps"),
            store_dir: Some(PathBuf::from("/deps/node_modules")),
            registry: Url::parse("https://registry.npmjs.org").unwrap(),
            packages: vec![],
        };
        assert_eq!(
            with_store.destination("wisper-init", "1.0.0"),
            PathBuf::from("/deps/node_modules/_wisper-init@1.0.0@wisper-init")
        );

        let without_store = InstallRequest {
            store_dir: None,
            ..with_store
        };
        assert_eq!(
            without_store.destination("wisper-init", "1.0.0"),
            PathBuf::from("/deps/node_modules/wisper-init")
        );
    }
}
