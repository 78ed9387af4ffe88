use crate::cli::args::RunArgs;
use crate::maria::{
    BinaryNames, Distribution, DistributionPaths, DEFAULT_DISTRIBUTION_ZIP, DEFAULT_PORT,
};
use crate::report::{DateStyle, Delimiter, ExportMode, TableOptions};
use crate::utils::errors::{CertListError, Result};
use crate::utils::paths::CertListPaths;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Delay between starting the server and first connecting to it
pub const DEFAULT_STARTUP_DELAY_MS: u64 = 2000;

/// Contents of `config.yaml`; every key is optional
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub temp: Option<PathBuf>,
    pub output: OutputSection,
    pub debug: DebugSection,
    pub database: DatabaseSection,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    pub filename: Option<PathBuf>,
    pub strict: bool,
    pub semicolon: bool,
    pub no_tz: bool,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DebugSection {
    pub mariadb: Option<PathBuf>,
    pub backup: Option<PathBuf>,
    pub nocleanup: bool,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSection {
    pub port: Option<u16>,
    pub startup_delay_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Load `explicit` if given, otherwise the first existing default location
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            tracing::info!("Loading config from {}", path.display());
            return Self::load(path);
        }

        for candidate in CertListPaths::config_candidates() {
            if candidate.is_file() {
                tracing::info!("Loading config from {}", candidate.display());
                return Self::load(&candidate);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }
}

/// Resolved operating parameters of one run
#[derive(Debug, Clone)]
pub struct Settings {
    pub backup: PathBuf,
    pub output: PathBuf,
    /// Parent of the work directory; system temp dir when unset
    pub temp: Option<PathBuf>,
    pub table: TableOptions,
    pub distribution: Distribution,
    pub cleanup: bool,
    pub port: u16,
    pub startup_delay: Duration,
}

impl Settings {
    /// Merge command line (including environment) over the config file over defaults
    pub fn resolve(args: &RunArgs, file: &FileConfig) -> Result<Self> {
        let backup = args
            .backup
            .clone()
            .or_else(|| file.debug.backup.clone())
            .ok_or_else(|| {
                CertListError::Config("No backup archive given (--backup or debug.backup)".into())
            })?;

        let output = args
            .output
            .clone()
            .or_else(|| file.output.filename.clone())
            .ok_or_else(|| {
                CertListError::Config(
                    "No output file given (--output or output.filename)".into(),
                )
            })?;

        let distribution = if args.system_mariadb {
            Distribution::Installed(DistributionPaths::from_path(&BinaryNames::for_platform())?)
        } else {
            let archive = match args.mariadb.clone().or_else(|| file.debug.mariadb.clone()) {
                Some(path) => path,
                None => CertListPaths::beside_exe(Path::new(DEFAULT_DISTRIBUTION_ZIP))?,
            };
            Distribution::for_platform(archive)
        };

        let table = TableOptions {
            mode: if args.strict || file.output.strict {
                ExportMode::Strict
            } else {
                ExportMode::Loose
            },
            delimiter: if args.semicolon || file.output.semicolon {
                Delimiter::Semicolon
            } else {
                Delimiter::Comma
            },
            dates: if args.no_tz || file.output.no_tz {
                DateStyle::Plain
            } else {
                DateStyle::WithZone
            },
        };

        let delay_ms = args
            .startup_delay_ms
            .or(file.database.startup_delay_ms)
            .unwrap_or(DEFAULT_STARTUP_DELAY_MS);

        Ok(Self {
            backup,
            output,
            temp: args.temp.clone().or_else(|| file.temp.clone()),
            table,
            distribution,
            cleanup: !(args.no_cleanup || file.debug.nocleanup),
            port: args.port.or(file.database.port).unwrap_or(DEFAULT_PORT),
            startup_delay: Duration::from_millis(delay_ms),
        })
    }
}
