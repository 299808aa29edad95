use std::io::IsTerminal;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use layerfs_cli::commands::Context;
use layerfs_cli::{execute, load_options, open_storage, CliError, Command};
use layerfs_registry::Registry;

/// layerfs - file operations on a configured layerfs storage
#[derive(Parser, Debug)]
#[command(name = "layerfs")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Storage options file (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log more; repeat for trace output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(args: Args) -> Result<(), CliError> {
    let registry = Registry::with_builtins();
    let options = load_options(args.config.as_deref())?;
    let storage = open_storage(&registry, options)?;

    let stdout = std::io::stdout();
    let ctx = Context {
        storage: &storage,
        registry: &registry,
        color: stdout.is_terminal(),
    };
    let mut out = stdout.lock();
    execute(&ctx, args.command, &mut out)
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
