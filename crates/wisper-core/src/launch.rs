//! Launching a resolved command module in a child process
//!
//! JavaScript entry points are loaded by a fresh `node -e` process that
//! requires the module and calls its export with the payload. Any other
//! entry point is run as an executable with the payload passed as
//! `--args-json <json>`. The child inherits stdio and the working directory;
//! its exit code becomes ours. Verbose runs export `LOG_LEVEL=verbose` to
//! the child.

use crate::config::LOG_LEVEL_ENV;
use crate::error::{Error, Result};
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command as TokioCommand;

/// Flag carrying the serialized payload to executable entry points
pub const ARGS_FLAG: &str = "--args-json";

/// Interpreter used for JavaScript entry points
pub const NODE_PROGRAM: &str = "node";

/// What gets run and with which payload
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    /// Absolute entry path with forward slashes
    pub entry_path: String,
    /// Sanitized argument payload
    pub args: Value,
    /// Ask the child for verbose logging
    pub verbose: bool,
}

/// How an entry point is started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// `node -e "require('<entry>').call(null, <args>)"`
    Node,
    /// `<entry> --args-json <args>`
    Executable,
}

impl LaunchMode {
    pub fn for_entry(entry_path: &str) -> Self {
        let ext = Path::new(entry_path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("js" | "cjs" | "mjs") => LaunchMode::Node,
            _ => LaunchMode::Executable,
        }
    }
}

/// A program and its arguments, ready to spawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl InvocationRequest {
    pub fn new(entry_path: impl Into<String>, args: Value) -> Self {
        Self {
            entry_path: entry_path.into(),
            args,
            verbose: false,
        }
    }

    pub fn verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    pub fn mode(&self) -> LaunchMode {
        LaunchMode::for_entry(&self.entry_path)
    }

    /// The command line for this request on the current platform
    pub fn command(&self) -> LaunchCommand {
        let payload = self.args.to_string();
        match self.mode() {
            LaunchMode::Node => platform_command(
                NODE_PROGRAM,
                vec!["-e".to_string(), node_expression(&self.entry_path, &payload)],
            ),
            LaunchMode::Executable => platform_command(
                &self.entry_path,
                vec![ARGS_FLAG.to_string(), payload],
            ),
        }
    }
}

/// Inline program that loads `entry_path` and calls its export with `payload`
pub fn node_expression(entry_path: &str, payload: &str) -> String {
    format!(
        "require('{}').call(null, {})",
        entry_path.replace('\\', "/").replace('\'', "\\'"),
        payload
    )
}

/// Wrap a program for the host: Windows goes through `cmd /c`
pub fn platform_command(program: &str, args: Vec<String>) -> LaunchCommand {
    if cfg!(windows) {
        let mut cmd_args = vec!["/c".to_string(), program.to_string()];
        cmd_args.extend(args);
        LaunchCommand {
            program: "cmd".to_string(),
            args: cmd_args,
        }
    } else {
        LaunchCommand {
            program: program.to_string(),
            args,
        }
    }
}

/// Exit code to report for a finished child; signal deaths map to 1
pub fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

/// Runs invocation requests
pub trait Launcher: Send + Sync {
    /// Run the request to completion and return the child's exit code
    fn launch(
        &self,
        request: &InvocationRequest,
        cwd: &Path,
    ) -> impl Future<Output = Result<i32>> + Send;
}

/// Launches requests as real child processes with inherited stdio
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    async fn launch(&self, request: &InvocationRequest, cwd: &Path) -> Result<i32> {
        let command = request.command();
        tracing::debug!(program = %command.program, args = ?command.args, "spawning");

        let mut child = TokioCommand::new(&command.program);
        if request.verbose {
            child.env(LOG_LEVEL_ENV, "verbose");
        }

        let status = child
            .args(&command.args)
            .current_dir(cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| Error::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let code = exit_code(status);
        tracing::debug!(code, "command module exited");
        Ok(code)
    }
}
