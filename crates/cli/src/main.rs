// seoaudit CLI - reconcile a site crawl export against an SEO metrics export

mod exit_codes;
mod export;
mod recon;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use exit_codes::{EXIT_ERROR, EXIT_SUCCESS};
use recon::ReconCommands;

#[derive(Parser)]
#[command(name = "seoaudit")]
#[command(about = "Reconcile a site crawl export against an SEO metrics export")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Log verbosity when RUST_LOG is unset (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: ReconCommands,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  seoaudit-recon ", env!("CARGO_PKG_VERSION"),
    )
}

/// Logs go to stderr so `--json` stdout stays a single JSON value.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match recon::cmd_recon(cli.command) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
