mod commands;
mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use replcap_engine::EngineConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "replcap")]
#[command(about = "Run JavaScript snippets in a sandbox and capture REPL-style output")]
#[command(version)]
pub struct Cli {
    /// Config file (default: ~/.config/replcap/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a script and print its result document as JSON
    Run {
        /// Script source, or `-` to read it from stdin
        code: Option<String>,

        /// Read the script from a file
        #[arg(short, long, conflicts_with = "code")]
        file: Option<PathBuf>,

        /// Execution budget in milliseconds
        #[arg(long)]
        budget_ms: Option<u64>,

        /// Pretty-print the result document
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
    /// Print the instrumented form of a script
    Instrument {
        /// Script source, or `-` to read it from stdin
        code: Option<String>,

        /// Read the script from a file
        #[arg(short, long, conflicts_with = "code")]
        file: Option<PathBuf>,
    },
    /// Answer `code_change` events read as JSON lines on stdin
    Relay {
        /// Execution budget in milliseconds
        #[arg(long)]
        budget_ms: Option<u64>,

        /// Run each event in a child engine process instead of a thread
        #[arg(long, default_value_t = false)]
        process: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.verbose, cli.log_file.as_deref())?;

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Run {
            code,
            file,
            budget_ms,
            pretty,
        } => {
            let source = commands::read_source(code, file)?;
            commands::execute_run(&config, budget_ms, &source, pretty)
        }
        Commands::Instrument { code, file } => {
            let source = commands::read_source(code, file)?;
            commands::execute_instrument(&source)
        }
        Commands::Relay { budget_ms, process } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(commands::execute_relay(config, budget_ms, process))
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            let mut config = EngineConfig::load_from(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            config
                .apply_env_from(|key| std::env::var(key).ok())
                .context("Invalid environment override")?;
            Ok(config)
        }
        None => EngineConfig::load().context("Failed to load config"),
    }
}
