use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "certlist")]
#[command(version = "1.0.0")]
#[command(about = "Certificate inventory report from a TippingPoint SMS database backup")]
#[command(long_about = None)]
pub struct Cli {
    /// Config file path (default: config.yaml beside the executable, then the current directory)
    #[arg(long, global = true, env = "CERTLIST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more verbosity: -v INFO, -vv DEBUG, -vvv TRACE)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output raw tab-separated values (no formatting)
    #[arg(short, long, global = true)]
    pub raw: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Restore an SMS backup into a throwaway MariaDB and export the certificate inventory
    Run(RunArgs),
    /// Decode a PEM certificate and show the fields used by the report
    Inspect {
        /// PEM file to decode
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,

        /// Print timestamps without the UTC suffix
        #[arg(long)]
        no_tz: bool,
    },
    /// Generate shell completion scripts
    Completion {
        #[command(subcommand)]
        command: CompletionCommands,
    },
}

/// Options of the `run` command; unset values fall back to the config file
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// SMS backup archive
    #[arg(short, long, env = "CERTLIST_DEBUG_BACKUP", value_hint = clap::ValueHint::FilePath)]
    pub backup: Option<PathBuf>,

    /// Report file to write
    #[arg(short, long, env = "CERTLIST_OUTPUT_FILENAME", value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Parent directory for the scratch work directory
    #[arg(long, env = "CERTLIST_TEMP", value_hint = clap::ValueHint::DirPath)]
    pub temp: Option<PathBuf>,

    /// Only export tagged columns, headed by their tag
    #[arg(long, env = "CERTLIST_OUTPUT_STRICT")]
    pub strict: bool,

    /// Separate fields with ';' instead of ','
    #[arg(long, env = "CERTLIST_OUTPUT_SEMICOLON")]
    pub semicolon: bool,

    /// Print timestamps without the UTC suffix
    #[arg(long, env = "CERTLIST_OUTPUT_NO_TZ")]
    pub no_tz: bool,

    /// MariaDB distribution archive (default: mariadb-latest.zip beside the executable)
    #[arg(long, env = "CERTLIST_DEBUG_MARIADB", value_hint = clap::ValueHint::FilePath)]
    pub mariadb: Option<PathBuf>,

    /// Keep the work directory after the run
    #[arg(long, env = "CERTLIST_DEBUG_NOCLEANUP")]
    pub no_cleanup: bool,

    /// Use MariaDB binaries found in PATH instead of extracting an archive
    #[arg(long, env = "CERTLIST_SYSTEM_MARIADB")]
    pub system_mariadb: bool,

    /// Loopback port for the temporary server
    #[arg(long, env = "CERTLIST_DATABASE_PORT")]
    pub port: Option<u16>,

    /// Wait after starting the server, in milliseconds
    #[arg(long, env = "CERTLIST_DATABASE_STARTUP_DELAY_MS")]
    pub startup_delay_ms: Option<u64>,
}

#[derive(Subcommand)]
pub enum CompletionCommands {
    /// Generate bash completion script
    Bash,
    /// Generate zsh completion script
    Zsh,
    /// Generate fish completion script
    Fish,
    /// Generate PowerShell completion script
    PowerShell,
}

impl CompletionCommands {
    pub fn shell(&self) -> Shell {
        match self {
            CompletionCommands::Bash => Shell::Bash,
            CompletionCommands::Zsh => Shell::Zsh,
            CompletionCommands::Fish => Shell::Fish,
            CompletionCommands::PowerShell => Shell::PowerShell,
        }
    }
}
