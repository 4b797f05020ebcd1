use std::{path::PathBuf, sync::LazyLock};

use clap::Parser;

pub mod commands;
pub mod config;
pub mod console;
pub mod logging;
pub mod synthetic;

pub static CLI: LazyLock<Cli> = LazyLock::new(Cli::parse);

#[derive(Debug, Parser)]
pub struct Cli {
  /// The path to the config file.
  #[arg(short, long, default_value = None)]
  pub config_path: Option<PathBuf>,

  /// The seed to use for station placement and synthetic sources.
  #[arg(short, long)]
  pub seed: Option<u64>,

  /// Use the built-in request and servicing generators even when external
  /// commands are configured.
  #[arg(long)]
  pub synthetic: bool,

  /// Start a run right away instead of waiting for `start` on stdin.
  #[arg(short, long)]
  pub autostart: bool,

  /// Stop and exit after this many seconds. Implies `--autostart`.
  #[arg(long, default_value = None)]
  pub run_for: Option<u64>,

  /// Also write logs to a file in this directory.
  #[arg(long, default_value = None)]
  pub log_dir: Option<PathBuf>,

  /// Where to record every plane position update, one JSON object per line.
  #[arg(long, default_value = None)]
  pub positions_path: Option<PathBuf>,
}
