//! Project directory setup for `wisper init`

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use wisper_core::CommandPolicy;

/// Options received from the dispatcher payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitOptions {
    /// Project directory name; `None` initializes the working directory
    pub project_name: Option<String>,
    pub force: bool,
    /// Package-manager command to run inside the new project
    pub install_command: Option<String>,
}

impl InitOptions {
    /// Parse `[projectName, { force, installCommand }]`
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let args = payload
            .as_array()
            .context("argument payload must be a JSON array")?;

        let project_name = args
            .first()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let options = args.last().and_then(Value::as_object);

        let force = options
            .and_then(|o| o.get("force"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let install_command = options
            .and_then(|o| o.get("installCommand"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            project_name,
            force,
            install_command,
        })
    }

    /// Directory the project is created in
    pub fn project_dir(&self, cwd: &Path) -> PathBuf {
        match &self.project_name {
            Some(name) => cwd.join(name),
            None => cwd.to_path_buf(),
        }
    }
}

/// Whether `dir` holds anything besides dotfiles and `node_modules`
pub fn has_content(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let name = entry?.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with('.') && name != "node_modules" {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Create the project directory and a starter package descriptor.
///
/// Returns the project directory.
pub fn prepare_project(options: &InitOptions, cwd: &Path) -> Result<PathBuf> {
    let dir = options.project_dir(cwd);

    if has_content(&dir)? && !options.force {
        anyhow::bail!(
            "Directory {} is not empty. Re-run with --force to initialize anyway",
            dir.display()
        );
    }

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let descriptor = dir.join("package.json");
    if !descriptor.exists() {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string());
        let body = json!({ "name": name, "version": "1.0.0", "private": true });
        let content = serde_json::to_string_pretty(&body)?;
        std::fs::write(&descriptor, content + "\n")
            .with_context(|| format!("Failed to write {}", descriptor.display()))?;
    }

    Ok(dir)
}

/// Run the optional install command through the package-manager whitelist
pub async fn run_install(options: &InitOptions, dir: &Path) -> Result<i32> {
    match &options.install_command {
        Some(command) => Ok(CommandPolicy::default().run(command, dir).await?),
        None => Ok(0),
    }
}
