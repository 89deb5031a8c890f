//! Entry-point lookup for installed command modules

use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

/// Name of the package descriptor file
pub const DESCRIPTOR_FILE: &str = "package.json";

/// The parts of a package descriptor this crate reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Entry file, relative to the descriptor's directory
    #[serde(default)]
    pub main: Option<String>,
}

/// Nearest directory at or above `start` that holds a package descriptor
pub fn find_package_dir(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(DESCRIPTOR_FILE).is_file())
        .map(Path::to_path_buf)
}

/// Read and parse the descriptor in `dir`
pub fn read_descriptor(dir: &Path) -> Option<PackageDescriptor> {
    let path = dir.join(DESCRIPTOR_FILE);
    let content = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(descriptor) => Some(descriptor),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed package descriptor");
            None
        }
    }
}

/// Absolute, forward-slash path of the entry file declared by the package
/// that contains `target_dir`.
///
/// Returns `None` when `target_dir` does not exist, when no descriptor is
/// found on the way up, or when the descriptor declares no `main`.
pub fn root_file_path(target_dir: &Path) -> Option<String> {
    let start = absolutize(target_dir);
    if !start.exists() {
        return None;
    }

    let dir = find_package_dir(&start)?;
    let main = read_descriptor(&dir)?.main.filter(|m| !m.trim().is_empty())?;

    Some(format_path(&normalize(&dir.join(main))))
}

/// Render a path with `/` separators regardless of platform
pub fn format_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Resolve `.` and `..` components without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
