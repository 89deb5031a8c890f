//! In-memory registry, installer and launcher used by the unit tests

use crate::cache::cache_entry_path;
use crate::error::{Error, Result};
use crate::installer::{InstallRequest, Installer};
use crate::launch::{InvocationRequest, Launcher};
use crate::registry::VersionSource;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use url::Url;

pub struct FakeRegistry {
    latest: Option<String>,
    url: Url,
    lookups: AtomicUsize,
}

impl FakeRegistry {
    pub fn with_latest(version: &str) -> Self {
        Self {
            latest: Some(version.to_string()),
            url: Url::parse("https://registry.example").unwrap(),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Every lookup fails like a network error
    pub fn unreachable() -> Self {
        Self {
            latest: None,
            ..Self::with_latest("0.0.0")
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl VersionSource for FakeRegistry {
    async fn latest_version(&self, _name: &str) -> Result<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.latest
            .clone()
            .ok_or_else(|| Error::registry("connection refused"))
    }

    fn registry_url(&self) -> &Url {
        &self.url
    }
}

/// Records install requests and materializes a minimal package for each
#[derive(Default)]
pub struct FakeInstaller {
    calls: Mutex<Vec<InstallRequest>>,
    fail: bool,
}

impl FakeInstaller {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<InstallRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Put a cache entry on disk without going through `install`
    pub fn preinstall(&self, store: &Path, name: &str, version: &str, main: Option<&str>) -> PathBuf {
        let dir = cache_entry_path(store, name, version);
        write_package(&dir, name, version, main);
        dir
    }
}

impl Installer for FakeInstaller {
    async fn install(&self, request: &InstallRequest) -> Result<()> {
        self.calls.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(Error::registry("simulated install failure"));
        }
        for package in &request.packages {
            let dir = request.destination(&package.name, &package.version);
            write_package(&dir, &package.name, &package.version, Some("lib/index.js"));
        }
        Ok(())
    }
}

fn write_package(dir: &Path, name: &str, version: &str, main: Option<&str>) {
    fs::create_dir_all(dir).unwrap();
    let mut descriptor = serde_json::json!({ "name": name, "version": version });
    if let Some(main) = main {
        descriptor["main"] = serde_json::Value::String(main.to_string());
        let entry = dir.join(main);
        fs::create_dir_all(entry.parent().unwrap()).unwrap();
        fs::write(entry, "module.exports = function () {}").unwrap();
    }
    fs::write(dir.join("package.json"), descriptor.to_string()).unwrap();
}

/// Records launches instead of spawning anything
pub struct RecordingLauncher {
    code: i32,
    launches: Mutex<Vec<(InvocationRequest, PathBuf)>>,
}

impl RecordingLauncher {
    pub fn exiting_with(code: i32) -> Self {
        Self {
            code,
            launches: Mutex::new(Vec::new()),
        }
    }

    pub fn launches(&self) -> Vec<(InvocationRequest, PathBuf)> {
        self.launches.lock().unwrap().clone()
    }
}

impl Launcher for RecordingLauncher {
    async fn launch(&self, request: &InvocationRequest, cwd: &Path) -> Result<i32> {
        self.launches
            .lock()
            .unwrap()
            .push((request.clone(), cwd.to_path_buf()));
        Ok(self.code)
    }
}
