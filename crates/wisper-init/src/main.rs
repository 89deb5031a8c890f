//! wisper-init - the `init` command module
//!
//! Started by the `wisper` dispatcher with the sanitized argument payload:
//! `wisper-init --args-json '["my-app", {"force": false}]'`

mod project;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use project::InitOptions;
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use wisper_core::config::LOG_LEVEL_ENV;
use wisper_core::ARGS_FLAG;

#[derive(Parser, Debug)]
#[command(name = "wisper-init")]
#[command(about = "Initialize a new project (run through `wisper init`)")]
#[command(version)]
pub struct Args {
    /// Argument payload forwarded by the dispatcher
    #[arg(long = ARGS_FLAG.trim_start_matches('-'))]
    pub args_json: String,
}

async fn run(args: Args) -> Result<i32> {
    let payload: Value =
        serde_json::from_str(&args.args_json).context("Invalid --args-json payload")?;
    let options = InitOptions::from_payload(&payload)?;
    tracing::debug!(project = ?options.project_name, force = options.force);

    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    let dir = project::prepare_project(&options, &cwd)?;
    println!("{} {}", "Created".green().bold(), dir.display());

    let code = project::run_install(&options, &dir).await?;
    if code != 0 {
        eprintln!("{} install command exited with {}", "Warning:".yellow(), code);
    }
    Ok(code)
}

#[tokio::main]
async fn main() {
    let verbose = std::env::var(LOG_LEVEL_ENV).is_ok_and(|l| l.eq_ignore_ascii_case("verbose"));
    let default = if verbose { "wisper_init=debug,wisper_core=debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .without_time()
        .with_writer(std::io::stderr)
        .try_init();

    match run(Args::parse()).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{} {:#}", "init ERR!".red().bold(), err);
            std::process::exit(1);
        }
    }
}
