//! Node.js detection for JavaScript command modules

use crate::launch::NODE_PROGRAM;
use crate::version::parse_version;
use semver::Version;
use std::process::Command;

/// Outcome of comparing the installed Node.js against the lowest supported version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeStatus {
    Supported(Version),
    TooOld { found: Version, lowest: Version },
    Missing,
}

/// `node --version` output, if node runs at all
fn installed_node_version() -> Option<String> {
    let out = Command::new(NODE_PROGRAM).arg("--version").output().ok()?;
    out.status
        .success()
        .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
}

/// Classify a reported node version (`v18.17.1`) against `lowest`
pub fn node_status(reported: Option<&str>, lowest: &str) -> NodeStatus {
    let Some(Ok(found)) = reported.map(parse_version) else {
        return NodeStatus::Missing;
    };
    match parse_version(lowest) {
        Ok(lowest) if found < lowest => NodeStatus::TooOld { found, lowest },
        _ => NodeStatus::Supported(found),
    }
}

/// Check the Node.js on PATH against `lowest`; a warning message when it is unusable
pub fn check_node_version(lowest: &str) -> Option<String> {
    match node_status(installed_node_version().as_deref(), lowest) {
        NodeStatus::Supported(_) => None,
        NodeStatus::TooOld { found, lowest } => Some(format!(
            "Node.js v{} or newer is required to run JavaScript command modules (found v{})",
            lowest, found
        )),
        NodeStatus::Missing => Some(
            "Node.js was not found; JavaScript command modules will not run (install from https://nodejs.org)"
                .to_string(),
        ),
    }
}
