//! Krypton CLI
//!
//! Present decoded video directly on a DRM/KMS output.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "krypton")]
#[command(about = "Direct DRM/KMS presentation of decoded video frames", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the card's connectors, modes, and scanout formats
    #[command(alias = "ls")]
    Probe(commands::probe::ProbeArgs),
    /// Present a moving test pattern
    Test(commands::test::TestArgs),
    /// Print or write a sample configuration file
    Config(commands::config::ConfigArgs),
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("krypton={level},krypton_core={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Probe(args) => commands::probe::run(args),
        Commands::Test(args) => commands::test::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
