//! `pynuxc`: the Pynux compiler driver binary (spec §6.1).

use clap::Parser;

use pynux::cli::{self, Cli};

fn main() {
  let cli = Cli::parse();

  let filter = tracing_subscriber::EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli::verbosity_filter(cli.verbose)));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();

  std::process::exit(cli::run(cli));
}
