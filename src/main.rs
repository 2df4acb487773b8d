use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use easy_ssh::cli::{self, connect::{ConnectOptions, Selection}};
use easy_ssh::config::{self, AppContext};
use easy_ssh::Result;

#[derive(Parser)]
#[command(name = "easy-ssh")]
#[command(version)]
#[command(about = "SSH launcher that remembers an encrypted password per host", long_about = None)]
struct Cli {
    /// Connect to this server instead of picking from the list, e.g. root@10.0.0.1:22
    #[arg(short = 'a', long = "add", value_name = "USER@HOST:PORT", conflicts_with = "seed")]
    add: Option<String>,

    /// Authenticate with this private key instead of a password
    #[arg(short, long, value_name = "FILE")]
    identity: Option<PathBuf>,

    /// Store a password for an alias without connecting
    #[arg(long, value_name = "ALIAS")]
    seed: Option<String>,

    /// Connection timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Directory holding servers.conf and the key file [default: ~/.easy-ssh]
    #[arg(long, env = "EASY_SSH_HOME", value_name = "DIR")]
    work_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    // Secrets are never logged at any level; RUST_LOG=easy_ssh=debug for detail
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("easy_ssh=warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Cli) -> Result<()> {
    let work_dir = match args.work_dir {
        Some(dir) => dir,
        None => config::default_work_dir()?,
    };

    let mut ctx = AppContext::open(work_dir)?;

    if let Some(alias) = args.seed {
        return cli::seed::run(&ctx, &alias);
    }

    let selection = match args.add {
        Some(literal) => Selection::Literal(literal),
        None => Selection::Interactive,
    };

    let options = ConnectOptions {
        identity: args.identity,
        timeout: Duration::from_secs(args.timeout),
    };

    cli::connect::run(&mut ctx, selection, options)
}
