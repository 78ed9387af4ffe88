use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CertListError {
    #[error("Archive entry {entry:?} escapes destination {}", destination.display())]
    PathTraversal { entry: String, destination: PathBuf },

    #[error("Failed to find {name} in {}", archive.display())]
    BinaryNotFound { name: String, archive: PathBuf },

    #[error("{entry}: file not found in {}", archive.display())]
    EntryNotFound { entry: String, archive: PathBuf },

    #[error("Failed to launch {} {}: {source}", binary.display(), args.join(" "))]
    ProcessLaunch {
        binary: PathBuf,
        args: Vec<String>,
        #[source]
        source: std::io::Error,
    },

    #[error("{} {} exited with {status}: {output}", binary.display(), args.join(" "))]
    ProcessFailed {
        binary: PathBuf,
        args: Vec<String>,
        status: String,
        output: String,
    },

    #[error("Failed to stop database server: {0}")]
    ProcessStop(#[source] std::io::Error),

    #[error("Failed to populate MariaDB: {0}")]
    Populate(String),

    #[error("Cannot {operation} database in state {state}")]
    Lifecycle {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Failed to parse certificate PEM")]
    MalformedPem,

    #[error("Certificate parsing error: {0}")]
    CertParsing(String),

    #[error("Report schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, CertListError>;
