mod commands;

use clap::Parser;
use dkfiles_core::domain::DkError;
use tracing_subscriber::{EnvFilter, fmt};

const PROGRAM_NAME: &str = "dkfiles-rs";
const DEFAULT_LOG_FILTER: &str = "info";

pub fn run_from_env() -> i32 {
    init_logging();
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let dk_error = error.as_dk_error();
            eprintln!("{}", dk_error.diagnostic_line());
            dk_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once(PROGRAM_NAME.to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();

    match Cli::try_parse_from(&full_args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

/// `RUST_LOG` overrides the default filter. Logs go to stderr so stdout only
/// carries command output.
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(name = "dkfiles-rs", version, about = "EvtGen decay-file catalog builder")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Catalog every decay file of a directory into one JSON report
    Catalog(commands::CatalogArgs),
    /// Show mothers, roots and decay trees of one decay file
    Inspect(commands::InspectArgs),
    /// Print the particle tokens of a decay descriptor
    Tokenize(commands::TokenizeArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Catalog(args) => commands::run_catalog_command(args),
        CliCommand::Inspect(args) => commands::run_inspect_command(args),
        CliCommand::Tokenize(args) => commands::run_tokenize_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(DkError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_dk_error(&self) -> DkError {
        match self {
            Self::Usage(message) => DkError::input_validation("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => DkError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
