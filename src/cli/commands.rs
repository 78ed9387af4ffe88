use crate::backup::extract_dump;
use crate::cli::args::*;
use crate::cli::completions::handle_completion_command;
use crate::cli::config::{FileConfig, Settings};
use crate::maria::{ping, recreate_database, MariaDb, DATABASE_NAME};
use crate::report::{decode_certificate, generate_report, save_table, DateStyle};
use crate::utils::errors::{CertListError, Result};
use crate::utils::output::OutputFormat;
use crate::utils::paths::{CertListPaths, WorkPaths};
use crate::utils::size::format_file_size;
use std::fs;
use std::io;
use std::path::Path;

pub async fn handle_command(cli: Cli) -> Result<()> {
    // Initialize logging - always to stderr
    if !cli.quiet {
        let log_level = match cli.verbose {
            0 => "certlist=warn,mariadbd=warn", // Default: warnings only
            1 => "certlist=info,mariadbd=warn", // -v: info level
            2 => "certlist=debug,mariadbd=debug", // -vv: debug level
            _ => "certlist=trace,mariadbd=debug,sqlx=debug", // -vvv+: trace level
        };

        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_env_filter(log_level)
            .init();
    }

    // Create output formatter
    let output = OutputFormat::new(cli.raw);

    match cli.command {
        Commands::Run(ref args) => handle_run_command(args, cli.config.as_deref()).await,
        Commands::Inspect { ref file, no_tz } => handle_inspect_command(file, no_tz, &output),
        Commands::Completion { ref command } => handle_completion_command(command),
    }
}

async fn handle_run_command(args: &RunArgs, config: Option<&Path>) -> Result<()> {
    let file_config = FileConfig::discover(config)?;
    let settings = Settings::resolve(args, &file_config)?;
    run_pipeline(&settings).await?;

    println!("Report written to {}", settings.output.display());
    Ok(())
}

/// Restore the backup into a scratch server and export the report.
///
/// The work directory is removed afterwards unless cleanup is disabled,
/// whether or not the run succeeded.
pub async fn run_pipeline(settings: &Settings) -> Result<()> {
    let work_dir = CertListPaths::create_work_dir(settings.temp.as_deref())?;
    tracing::info!("Work directory: {}", work_dir.path().display());

    let result = run_in_work_dir(settings, work_dir.path()).await;

    if settings.cleanup {
        let path = work_dir.path().to_path_buf();
        if let Err(e) = work_dir.close() {
            tracing::warn!("Failed to remove work directory {}: {e}", path.display());
        }
    } else {
        let kept = work_dir.keep();
        tracing::info!("Keeping work directory {}", kept.display());
    }

    result
}

async fn run_in_work_dir(settings: &Settings, work: &Path) -> Result<()> {
    let backup_size = fs::metadata(&settings.backup)
        .map_err(|e| {
            CertListError::InvalidInput(format!(
                "Cannot read backup archive {}: {e}",
                settings.backup.display()
            ))
        })?
        .len();
    tracing::info!(
        "Backup {} is {}",
        settings.backup.display(),
        format_file_size(backup_size)
    );

    let mut db = MariaDb::new(
        settings.distribution.clone(),
        WorkPaths::new(work),
        settings.port,
    );

    tracing::info!("Extracting MariaDB");
    db.extract()?;
    tracing::info!("Initializing data directory");
    db.init().await?;
    tracing::info!("Starting MariaDB on port {}", db.port());
    db.start().await?;

    let result = with_running_server(&db, settings).await;

    tracing::info!("Stopping MariaDB");
    match (result, db.stop().await) {
        (Ok(()), stopped) => stopped,
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(stop_error)) => {
            tracing::warn!("{stop_error}");
            Err(e)
        }
    }
}

async fn with_running_server(db: &MariaDb, settings: &Settings) -> Result<()> {
    tokio::time::sleep(settings.startup_delay).await;

    tracing::info!("Extracting database dump");
    let dump = extract_dump(&settings.backup)?;
    let result = load_and_export(db, &dump, settings).await;

    if settings.cleanup {
        if let Err(e) = fs::remove_file(&dump) {
            tracing::warn!("Failed to remove dump {}: {e}", dump.display());
        }
    }
    result
}

async fn load_and_export(db: &MariaDb, dump: &Path, settings: &Settings) -> Result<()> {
    let admin = db.open("")?;
    ping(&admin).await?;
    tracing::info!("Recreating database {DATABASE_NAME}");
    recreate_database(&admin, DATABASE_NAME).await?;
    admin.close().await;

    tracing::info!("Loading dump {}", dump.display());
    db.populate(dump, DATABASE_NAME).await?;

    let pool = db.open(DATABASE_NAME)?;
    ping(&pool).await?;
    tracing::info!("Generating report");
    let rows = generate_report(&pool).await;
    pool.close().await;
    let rows = rows?;

    tracing::info!("Saving {} rows to {}", rows.len(), settings.output.display());
    save_table(&settings.output, &rows, &settings.table)
}

fn handle_inspect_command(file: &Path, no_tz: bool, output: &OutputFormat) -> Result<()> {
    let pem = fs::read(file)?;
    let cert = decode_certificate(&pem)?;
    let dates = if no_tz {
        DateStyle::Plain
    } else {
        DateStyle::WithZone
    };

    let pairs = vec![
        ("Subject", cert.subject.clone()),
        ("Issuer", cert.issuer.clone()),
        ("Serial Number", cert.serial_number.clone()),
        ("Not Before", dates.format(&cert.not_before)),
        ("Not After", dates.format(&cert.not_after)),
        ("Key Size", cert.key_size.to_string()),
        ("Signature Algorithm", cert.signature_algorithm.clone()),
        ("Version", cert.version.to_string()),
    ];
    output.print_key_value(&pairs);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::write_zip;
    use crate::maria::Distribution;
    use crate::report::TableOptions;
    use std::path::PathBuf;
    use std::time::Duration;

    fn settings(dir: &Path, cleanup: bool) -> Settings {
        Settings {
            backup: dir.join("sms.zip"),
            output: dir.join("report.csv"),
            temp: Some(dir.join("work")),
            table: TableOptions::default(),
            distribution: Distribution::Archive {
                path: dir.join("mariadb.zip"),
                names: Default::default(),
            },
            cleanup,
            port: 33060,
            startup_delay: Duration::ZERO,
        }
    }

    fn work_dirs(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir.join("work"))
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    #[tokio::test]
    async fn test_failed_run_removes_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sms.zip"), b"backup").unwrap();
        // Distribution archive without any binaries
        write_zip(&dir.path().join("mariadb.zip"), &[("README", b"docs")]);

        let settings = settings(dir.path(), true);
        let err = run_pipeline(&settings).await.unwrap_err();

        assert!(matches!(err, CertListError::BinaryNotFound { .. }));
        assert!(work_dirs(dir.path()).is_empty());
        assert!(!settings.output.exists());
    }

    #[tokio::test]
    async fn test_no_cleanup_keeps_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sms.zip"), b"backup").unwrap();
        write_zip(&dir.path().join("mariadb.zip"), &[("README", b"docs")]);

        let settings = settings(dir.path(), false);
        assert!(run_pipeline(&settings).await.is_err());

        let kept = work_dirs(dir.path());
        assert_eq!(kept.len(), 1);
        assert!(kept[0].join("maria").join("README").exists());
    }

    #[tokio::test]
    async fn test_missing_backup_fails_before_extraction() {
        let dir = tempfile::tempdir().unwrap();

        let err = run_pipeline(&settings(dir.path(), true)).await.unwrap_err();
        assert!(matches!(err, CertListError::InvalidInput(ref msg) if msg.contains("sms.zip")));
        assert!(work_dirs(dir.path()).is_empty());
    }

    #[test]
    fn test_inspect_fixture() {
        let output = OutputFormat::new(true);
        let fixture = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/ec256.pem");
        handle_inspect_command(&fixture, false, &output).unwrap();
    }

    #[test]
    fn test_inspect_rejects_non_pem() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cert.pem");
        fs::write(&file, "not a certificate").unwrap();

        let err = handle_inspect_command(&file, false, &OutputFormat::new(false)).unwrap_err();
        assert!(matches!(err, CertListError::MalformedPem));
    }
}
