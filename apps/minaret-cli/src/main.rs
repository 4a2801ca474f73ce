#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod commands;
mod config;
mod logging;

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use url::Url;

use crate::commands::{Command, Context};
use crate::config::{AppConfig, CliOverrides};

/// Minaret command-line client
#[derive(Parser)]
#[command(name = "minaret")]
#[command(version, about = "Minaret command-line client")]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config)
    #[arg(long, global = true)]
    base_url: Option<Url>,

    /// Token file location (overrides config)
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    /// Print effective configuration (JSON) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) defaults -> 2) YAML (if provided) -> 3) env (MINARET__*) -> 4) CLI overrides
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_cli_overrides(&CliOverrides {
        base_url: cli.base_url,
        credentials: cli.credentials,
    });

    logging::init(&config.logging, cli.verbose)?;

    if cli.print_config {
        println!("{}", config.to_pretty_json()?);
        return Ok(());
    }

    let Some(command) = cli.command else {
        bail!("no command given; see `minaret --help`");
    };

    let ctx = Context::open(config)?;
    let output = command.run(&ctx).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
