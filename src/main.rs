mod analytics;
mod api;
mod app;
mod cache;
mod commands;
mod config;
mod logging;
mod query;
mod settings;
mod workflow;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fundview")]
#[command(about = "A command-line client for the fund registry back office")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/fundview/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  let _log_guard = logging::init(config.log_level.as_deref())?;

  let mut app = app::App::new(config)?;
  let mut output = String::new();
  let result = app.execute(args.command, &mut output).await;
  print!("{}", output);

  result
}
