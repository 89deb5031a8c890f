//! Wisper CLI - runs independently published command modules

mod logging;

use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use colored::Colorize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use wisper_core::{
    registry, runtime, version, Config, DispatchRequest, Dispatcher, Overrides, ProcessLauncher,
    ProductConfig, RegistryClient, TarballInstaller,
};

/// CLI version
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Wisper product configuration
#[derive(Clone)]
pub struct WisperConfig;

impl ProductConfig for WisperConfig {
    fn name(&self) -> &'static str {
        "wisper"
    }

    fn package_name(&self) -> &'static str {
        "@wisper-cli/core"
    }

    fn commands(&self) -> &'static [(&'static str, &'static str)] {
        &[("init", "@wisper-cli/init")]
    }

    fn default_registry_url(&self) -> &'static str {
        registry::default_registry(true)
    }

    fn registry_url_env(&self) -> &'static str {
        "WISPER_REGISTRY"
    }

    fn default_home_dir(&self) -> &'static str {
        ".wisper-cli"
    }

    fn upgrade_command(&self) -> &'static str {
        "npm install -g @wisper-cli/core"
    }
}

#[derive(Parser, Debug)]
#[command(name = "wisper")]
#[command(about = "Scaffolding CLI that runs versioned command modules")]
#[command(version)]
pub struct Args {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Run the command module found at this local path instead of the cache
    #[arg(short, long = "target-path", global = true)]
    pub target_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a new project
    Init(InitArgs),
}

#[derive(ClapArgs, Debug)]
pub struct InitArgs {
    /// Name of the project to create
    pub project_name: Option<String>,

    /// Initialize even if the target directory is not empty
    #[arg(short, long)]
    pub force: bool,

    /// Package-manager command to run once the project is created (e.g. "npm install")
    #[arg(long = "install-command")]
    pub install_command: Option<String>,
}

impl Args {
    /// Global options, as the parent context of every command object
    fn parent(&self) -> Value {
        json!({
            "debug": self.debug,
            "targetPath": self.target_path.as_ref().map(|p| p.display().to_string()),
        })
    }

    /// Translate the parsed command into a dispatch request
    pub fn to_request(&self) -> DispatchRequest {
        match &self.command {
            Command::Init(init) => {
                let mut options = Map::new();
                options.insert("force".to_string(), json!(init.force));
                if let Some(cmd) = &init.install_command {
                    options.insert("installCommand".to_string(), json!(cmd));
                }
                DispatchRequest {
                    command: "init".to_string(),
                    positionals: vec![json!(init.project_name)],
                    command_object: command_object("init", &["projectName"], options, self.parent()),
                }
            }
        }
    }
}

/// Command object in the shape command modules have always received:
/// internal `_` fields, the `parent` context and the command's options
fn command_object(
    name: &str,
    arg_names: &[&str],
    options: Map<String, Value>,
    parent: Value,
) -> Map<String, Value> {
    let mut object = Map::new();
    object.insert("_name".to_string(), json!(name));
    object.insert("_args".to_string(), json!(arg_names));
    object.insert("parent".to_string(), parent);
    object.extend(options);
    object
}

/// Startup checks that never block the command
async fn preflight(product: &WisperConfig, config: &Config, client: &RegistryClient) {
    tracing::info!("{} {}", product.name(), CLI_VERSION);
    tracing::debug!(home = %config.home_path.display(), registry = %config.registry);

    if let Some(warning) = runtime::check_node_version(product.lowest_node_version()) {
        tracing::debug!("{}", warning);
    }

    match version::check_global_update(product, client, CLI_VERSION).await {
        Ok(Some(warning)) => eprintln!("{}", warning.yellow()),
        Ok(None) => {}
        Err(e) => tracing::debug!(error = %e, "update check skipped"),
    }
}

async fn run(args: Args, product: WisperConfig) -> Result<i32> {
    let config = Config::load(
        &product,
        Overrides {
            debug: args.debug,
            target_path: args.target_path.clone(),
        },
    )?;
    logging::init(config.debug);

    let client = RegistryClient::new(config.registry.clone(), product.user_agent())?;
    preflight(&product, &config, &client).await;

    let request = args.to_request();
    let installer = TarballInstaller::new(product.user_agent());
    let dispatcher = Dispatcher::new(product, config, client, installer, ProcessLauncher);

    Ok(dispatcher.dispatch(&request).await?)
}

#[tokio::main]
async fn main() {
    // Handle Ctrl+C: the child shares our process group and gets the signal too
    ctrlc::set_handler(move || {
        std::process::exit(130);
    })
    .ok();

    let args = Args::parse();
    let debug = args.debug;

    match run(args, WisperConfig).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{} {}", "wisper ERR!".red().bold(), err);
            if debug {
                eprintln!("{:?}", err);
            }
            std::process::exit(1);
        }
    }
}
