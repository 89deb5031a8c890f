//! Whitelist for commands that command modules run on the user's behalf
//!
//! Project initialization runs install/start commands that come from
//! template metadata. Only known package-manager executables may be run.

use crate::error::{Error, Result};
use crate::launch::{exit_code, platform_command};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command as TokioCommand;

/// Executables allowed by default
pub const DEFAULT_ALLOWED: &[&str] = &["npm", "cnpm", "yarn", "pnpm"];

/// Characters `cmd /c` and POSIX shells treat as operators or expansions
const SHELL_METACHARACTERS: &[char] = &['&', '|', '<', '>', '^', ';', '`', '$', '(', ')', '%'];

/// A command line split into program and arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// Set of executables a command line may start with
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    allowed: Vec<String>,
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED.iter().copied())
    }
}

impl CommandPolicy {
    pub fn new<'a>(allowed: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            allowed: allowed.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn is_allowed(&self, program: &str) -> bool {
        self.allowed.iter().any(|a| a == program)
    }

    /// Split `command_line` and verify its program is whitelisted.
    ///
    /// Lines containing shell metacharacters are rejected as well: on
    /// Windows the command runs through `cmd /c`, which would chain them.
    pub fn check(&self, command_line: &str) -> Result<CheckedCommand> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_default();

        if !self.is_allowed(&program) || command_line.contains(SHELL_METACHARACTERS) {
            return Err(Error::CommandNotAllowed {
                command: command_line.trim().to_string(),
                allowed: self.allowed.join(", "),
            });
        }

        Ok(CheckedCommand {
            program,
            args: parts.collect(),
        })
    }

    /// Check then run `command_line` in `cwd`, returning its exit code
    pub async fn run(&self, command_line: &str, cwd: &Path) -> Result<i32> {
        let checked = self.check(command_line)?;
        let command = platform_command(&checked.program, checked.args);
        tracing::debug!(program = %command.program, args = ?command.args, "running whitelisted command");

        let status = TokioCommand::new(&command.program)
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

        Ok(exit_code(status))
    }
}
