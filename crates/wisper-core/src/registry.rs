//! Package registry client
//!
//! Answers "what is the newest published version of this package" and
//! "where is the tarball for this version". Holds no local state.

use crate::error::{Error, Result};
use reqwest::Client;
use semver::{Version, VersionReq};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Public npm registry
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// Mirror registry, usually much faster from mainland China
pub const MIRROR_REGISTRY: &str = "https://registry.npmmirror.com";

/// Registry base URL, either the public registry or the mirror
pub fn default_registry(original: bool) -> &'static str {
    if original {
        DEFAULT_REGISTRY
    } else {
        MIRROR_REGISTRY
    }
}

/// Source of published versions for a package
pub trait VersionSource: Send + Sync {
    /// Highest published semantic version of `name`
    fn latest_version(&self, name: &str) -> impl Future<Output = Result<String>> + Send;

    /// Registry base URL handed to the installer
    fn registry_url(&self) -> &Url;
}

/// HTTP client for an npm-compatible registry
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: Url,
    http: Client,
}

impl RegistryClient {
    /// Create a client for the registry at `base_url`
    pub fn new(base_url: Url, user_agent: &str) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { base_url, http })
    }

    /// HTTP client, reused for tarball downloads
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Metadata URL for a package; the scope separator of `@scope/name` is encoded
    pub fn packument_url(&self, name: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::registry(format!("URL cannot have path segments: {}", self.base_url)))?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }

    /// Fetch the packument (package metadata) for `name`
    pub async fn fetch_packument(&self, name: &str) -> Result<Value> {
        let url = self.packument_url(name)?;
        tracing::debug!(%url, "fetching package metadata");

        let response = self.http.get(url.clone()).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(name.to_string()));
        }
        if !response.status().is_success() {
            return Err(Error::registry(format!(
                "Registry returned HTTP {} for {}",
                response.status(),
                url
            )));
        }

        Ok(response.json().await?)
    }

    /// Highest published version compatible with `^base` and newer than it
    pub async fn newest_compatible(&self, name: &str, base: &str) -> Result<Option<String>> {
        let packument = self.fetch_packument(name).await?;
        Ok(newest_compatible(&published_versions(&packument), base).map(|v| v.to_string()))
    }
}

impl VersionSource for RegistryClient {
    async fn latest_version(&self, name: &str) -> Result<String> {
        let packument = self.fetch_packument(name).await?;
        highest_version(&published_versions(&packument))
            .map(|v| v.to_string())
            .ok_or_else(|| Error::Resolution {
                name: name.to_string(),
                reason: "registry lists no published versions".to_string(),
            })
    }

    fn registry_url(&self) -> &Url {
        &self.base_url
    }
}

/// All valid semantic versions listed in a packument
pub fn published_versions(packument: &Value) -> Vec<Version> {
    packument
        .get("versions")
        .and_then(Value::as_object)
        .map(|versions| {
            versions
                .keys()
                .filter_map(|v| Version::parse(v).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Tarball URL of a specific version
pub fn tarball_url<'a>(packument: &'a Value, version: &str) -> Option<&'a str> {
    packument
        .get("versions")?
        .get(version)?
        .get("dist")?
        .get("tarball")?
        .as_str()
}

/// Highest version in the set
pub fn highest_version(versions: &[Version]) -> Option<&Version> {
    versions.iter().max()
}

/// Highest version satisfying `^base` that is strictly greater than `base`
pub fn newest_compatible<'a>(versions: &'a [Version], base: &str) -> Option<&'a Version> {
    let base_version = Version::parse(base).ok()?;
    let req = VersionReq::parse(&format!("^{}", base)).ok()?;
    versions
        .iter()
        .filter(|v| req.matches(v) && **v > base_version)
        .max()
}
