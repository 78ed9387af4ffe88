use crate::maria::distribution::{Distribution, DistributionPaths};
use crate::utils::errors::{CertListError, Result};
use crate::utils::paths::{CertListPaths, WorkPaths};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

pub const DEFAULT_PORT: u16 = 33060;
pub const LOOPBACK: &str = "127.0.0.1";
pub const ROOT_USER: &str = "root";

/// Where a supervised instance is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unextracted,
    Extracted,
    Initialized,
    Running,
    Stopped,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unextracted => "unextracted",
            Self::Extracted => "extracted",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One throwaway MariaDB instance living inside a work directory.
///
/// The caller drives `extract → init → start → … → stop` and must call
/// [`MariaDb::stop`] on every path after a successful [`MariaDb::start`];
/// dropping a running handle does not terminate the server.
pub struct MariaDb {
    distribution: Distribution,
    paths: WorkPaths,
    port: u16,
    binaries: Option<DistributionPaths>,
    server: Option<Child>,
    console: Option<JoinHandle<()>>,
    state: LifecycleState,
}

impl MariaDb {
    pub fn new(distribution: Distribution, paths: WorkPaths, port: u16) -> Self {
        Self {
            distribution,
            paths,
            port,
            binaries: None,
            server: None,
            console: None,
            state: LifecycleState::Unextracted,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn paths(&self) -> &WorkPaths {
        &self.paths
    }

    pub fn binaries(&self) -> Option<&DistributionPaths> {
        self.binaries.as_ref()
    }

    /// Resolve the executables, unpacking the distribution when needed
    pub fn extract(&mut self) -> Result<()> {
        self.require("extract", LifecycleState::Unextracted)?;
        let binaries = self.distribution.extract(&self.paths.maria_dir())?;
        if !binaries.is_complete() {
            return Err(CertListError::InvalidInput(format!(
                "Incomplete MariaDB distribution: {binaries:?}"
            )));
        }
        self.binaries = Some(binaries);
        self.state = LifecycleState::Extracted;
        Ok(())
    }

    /// Create the system tables in a fresh data directory
    pub async fn init(&mut self) -> Result<()> {
        self.require("initialize", LifecycleState::Extracted)?;
        let installer = self.resolved()?.installer.clone();
        let data_dir = self.paths.data_dir();
        CertListPaths::ensure_dir_exists(&data_dir)?;

        let args = installer_args(&data_dir);
        tracing::debug!("Running {} {}", installer.display(), args.join(" "));
        let output = Command::new(&installer)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| CertListError::ProcessLaunch {
                binary: installer.clone(),
                args: args.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CertListError::ProcessFailed {
                binary: installer,
                args,
                status: output.status.to_string(),
                output: combined_output(&output),
            });
        }

        self.state = LifecycleState::Initialized;
        Ok(())
    }

    /// Launch the server in the background without waiting for readiness
    pub async fn start(&mut self) -> Result<()> {
        self.require("start", LifecycleState::Initialized)?;
        let server = self.resolved()?.server.clone();
        let args = server_args(&self.paths, self.port);
        tracing::debug!("Running {} {}", server.display(), args.join(" "));

        let mut child = Command::new(&server)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CertListError::ProcessLaunch {
                binary: server.clone(),
                args: args.clone(),
                source,
            })?;

        if let Some(stderr) = child.stderr.take() {
            self.console = Some(tokio::spawn(async move {
                forward_console(BufReader::new(stderr)).await;
            }));
        }

        tracing::debug!("MariaDB server pid {:?}", child.id());
        self.server = Some(child);
        self.state = LifecycleState::Running;
        Ok(())
    }

    /// Kill the server and wait for it to exit
    pub async fn stop(&mut self) -> Result<()> {
        self.require("stop", LifecycleState::Running)?;
        let mut child = self.server.take().ok_or(CertListError::Lifecycle {
            operation: "stop",
            state: LifecycleState::Running.as_str(),
        })?;
        self.state = LifecycleState::Stopped;

        child.start_kill().map_err(CertListError::ProcessStop)?;
        let status = child.wait().await.map_err(CertListError::ProcessStop)?;
        tracing::debug!("MariaDB server exited with {status}");

        if let Some(console) = self.console.take() {
            if let Err(e) = console.await {
                tracing::debug!("Console forwarder ended abnormally: {e}");
            }
        }
        Ok(())
    }

    /// Connection settings for `database`; an empty name selects no default database
    pub fn connect_options(&self, database: &str) -> MySqlConnectOptions {
        let options = MySqlConnectOptions::new()
            .host(LOOPBACK)
            .port(self.port)
            .username(ROOT_USER);
        if database.is_empty() {
            options
        } else {
            options.database(database)
        }
    }

    /// Human readable form of [`MariaDb::connect_options`]
    pub fn connection_url(&self, database: &str) -> String {
        format!("mysql://{ROOT_USER}@{LOOPBACK}:{}/{database}", self.port)
    }

    /// Lazily connecting pool; callers should ping before trusting it
    pub fn open(&self, database: &str) -> Result<MySqlPool> {
        self.require("open", LifecycleState::Running)?;
        tracing::debug!("Opening {}", self.connection_url(database));
        Ok(MySqlPoolOptions::new()
            .max_connections(1)
            .connect_lazy_with(self.connect_options(database)))
    }

    /// Feed `dump` to the client as standard input against `database`
    pub async fn populate(&self, dump: &Path, database: &str) -> Result<()> {
        self.require("populate", LifecycleState::Running)?;
        let client = self.resolved()?.client.clone();
        let input = File::open(dump).map_err(|e| {
            CertListError::InvalidInput(format!(
                "Failed to open dump file {}: {e}",
                dump.display()
            ))
        })?;

        let args = client_args(self.port, database);
        tracing::debug!(
            "Running {} {} < {}",
            client.display(),
            args.join(" "),
            dump.display()
        );
        let output = Command::new(&client)
            .args(&args)
            .stdin(Stdio::from(input))
            .output()
            .await
            .map_err(|source| CertListError::ProcessLaunch {
                binary: client.clone(),
                args: args.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!("{} output: {}", client.display(), stdout.trim());
        }
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if is_benign_load_failure(&stderr, database) {
            tracing::warn!("Ignoring known load failure: {}", stderr.trim());
            return Ok(());
        }
        Err(CertListError::Populate(combined_output(&output)))
    }

    fn require(&self, operation: &'static str, expected: LifecycleState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CertListError::Lifecycle {
                operation,
                state: self.state.as_str(),
            })
        }
    }

    fn resolved(&self) -> Result<&DistributionPaths> {
        self.binaries.as_ref().ok_or(CertListError::Lifecycle {
            operation: "run",
            state: LifecycleState::Unextracted.as_str(),
        })
    }
}

/// Log every console line at debug level until EOF; returns the line count.
///
/// Lines are read as bytes so invalid UTF-8 never stops the drain, which
/// would leave the server writing to a closed pipe.
async fn forward_console<R>(mut reader: R) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut count = 0;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                tracing::debug!(target: "mariadbd", "{}", line.trim_end());
                count += 1;
            }
            Err(e) => {
                tracing::debug!("Stopped reading server console: {e}");
                break;
            }
        }
    }
    count
}

/// The dump's `alerts` table fails to load on fresh schemas and is safe to skip
pub fn is_benign_load_failure(stderr: &str, database: &str) -> bool {
    stderr.contains(&format!("{database}.alerts"))
}

fn installer_args(data_dir: &Path) -> Vec<String> {
    vec![format!("--datadir={}", data_dir.display())]
}

fn server_args(paths: &WorkPaths, port: u16) -> Vec<String> {
    vec![
        format!("--datadir={}", paths.data_dir().display()),
        format!("--bind-address={LOOPBACK}"),
        format!("--port={port}"),
        format!("--log-error={}", paths.error_log().display()),
        format!("--pid-file={}", paths.pid_file().display()),
        "--skip-grant-tables".to_string(),
        "--console".to_string(),
    ]
}

fn client_args(port: u16, database: &str) -> Vec<String> {
    vec![
        format!("--user={ROOT_USER}"),
        "--skip-password".to_string(),
        format!("--host={LOOPBACK}"),
        format!("--port={port}"),
        database.to_string(),
    ]
}

fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn installed(server: PathBuf, client: PathBuf, installer: PathBuf) -> Distribution {
        Distribution::Installed(DistributionPaths {
            server,
            client,
            installer,
        })
    }

    fn handle(dir: &Path, distribution: Distribution) -> MariaDb {
        MariaDb::new(distribution, WorkPaths::new(dir), DEFAULT_PORT)
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_server_args() {
        let paths = WorkPaths::new("/w");
        assert_eq!(
            server_args(&paths, 33060),
            vec![
                "--datadir=/w/data",
                "--bind-address=127.0.0.1",
                "--port=33060",
                "--log-error=/w/mariadb_error.log",
                "--pid-file=/w/mariadb.pid",
                "--skip-grant-tables",
                "--console",
            ]
        );
    }

    #[test]
    fn test_client_args() {
        assert_eq!(
            client_args(4000, "sms"),
            vec![
                "--user=root",
                "--skip-password",
                "--host=127.0.0.1",
                "--port=4000",
                "sms",
            ]
        );
    }

    #[test]
    fn test_connection_url() {
        let db = handle(Path::new("/w"), Distribution::Installed(DistributionPaths::homebrew()));
        assert_eq!(db.connection_url(""), "mysql://root@127.0.0.1:33060/");
        assert_eq!(db.connection_url("sms"), "mysql://root@127.0.0.1:33060/sms");
    }

    #[test]
    fn test_benign_load_failure() {
        let stderr = "ERROR 1146 (42S02) at line 812: Table 'sms.alerts' doesn't exist";
        assert!(is_benign_load_failure(stderr, "sms"));
        assert!(!is_benign_load_failure(stderr, "other"));
        assert!(!is_benign_load_failure(
            "ERROR 1064 (42000) at line 1: syntax error",
            "sms"
        ));
    }

    #[tokio::test]
    async fn test_operations_require_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = handle(
            dir.path(),
            Distribution::Installed(DistributionPaths::homebrew()),
        );

        assert!(matches!(
            db.start().await,
            Err(CertListError::Lifecycle { operation: "start", state: "unextracted" })
        ));
        assert!(matches!(db.stop().await, Err(CertListError::Lifecycle { .. })));
        assert!(db.open("sms").is_err());

        db.extract().unwrap();
        assert_eq!(db.state(), LifecycleState::Extracted);
        assert!(matches!(
            db.populate(Path::new("dump.sql"), "sms").await,
            Err(CertListError::Lifecycle { operation: "populate", state: "extracted" })
        ));
        assert!(db.extract().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_init_reports_captured_output() {
        let dir = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let installer = script(bin.path(), "install-db", "echo \"creating $1\"; echo boom >&2; exit 3");
        let mut db = handle(
            dir.path(),
            installed(PathBuf::from("server"), PathBuf::from("client"), installer),
        );
        db.extract().unwrap();

        let err = db.init().await.unwrap_err();
        match err {
            CertListError::ProcessFailed { args, output, .. } => {
                assert_eq!(args, vec![format!("--datadir={}", dir.path().join("data").display())]);
                assert!(output.contains("creating --datadir="));
                assert!(output.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(db.state(), LifecycleState::Extracted);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_init_rerun_on_existing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        let bin = tempfile::tempdir().unwrap();
        let installer = script(bin.path(), "install-db", "exit 0");
        let mut db = handle(
            dir.path(),
            installed(PathBuf::from("server"), PathBuf::from("client"), installer),
        );
        db.extract().unwrap();

        db.init().await.unwrap();
        assert_eq!(db.state(), LifecycleState::Initialized);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_and_stop_supervised_server() {
        let dir = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let installer = script(bin.path(), "install-db", "exit 0");
        let server = script(bin.path(), "mariadbd", "echo ready >&2; exec sleep 30");
        let mut db = handle(
            dir.path(),
            installed(server, PathBuf::from("client"), installer),
        );
        db.extract().unwrap();
        db.init().await.unwrap();

        db.start().await.unwrap();
        assert_eq!(db.state(), LifecycleState::Running);
        assert!(db.open("").is_ok());

        db.stop().await.unwrap();
        assert_eq!(db.state(), LifecycleState::Stopped);
        assert!(db.stop().await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let installer = script(bin.path(), "install-db", "exit 0");
        let mut db = handle(
            dir.path(),
            installed(bin.path().join("absent"), PathBuf::from("client"), installer),
        );
        db.extract().unwrap();
        db.init().await.unwrap();

        let err = db.start().await.unwrap_err();
        assert!(matches!(err, CertListError::ProcessLaunch { .. }));
        assert_eq!(db.state(), LifecycleState::Initialized);
    }

    #[tokio::test]
    async fn test_forward_console_drains_invalid_utf8() {
        let console: &[u8] = b"caf\xe9\nstill logging\nno newline at end";
        assert_eq!(forward_console(console).await, 3);
        assert_eq!(forward_console(&b""[..]).await, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_server_keeps_writing_after_invalid_utf8_line() {
        let dir = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let alive = dir.path().join("alive");
        let installer = script(bin.path(), "install-db", "exit 0");
        let body = format!(
            "printf 'caf\\351\\n' >&2; sleep 1; echo still-logging >&2; touch '{}'; exec sleep 30",
            alive.display()
        );
        let server = script(bin.path(), "mariadbd", &body);
        let mut db = handle(dir.path(), installed(server, PathBuf::from("client"), installer));
        db.extract().unwrap();
        db.init().await.unwrap();
        db.start().await.unwrap();

        for _ in 0..50 {
            if alive.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        let survived = alive.exists();
        db.stop().await.unwrap();

        assert!(survived, "server died writing to its console");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_populate_failure_includes_client_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let body = "cat > /dev/null; echo 'processed 12 statements'; echo 'ERROR 2006 (HY000): server has gone away' >&2; exit 1";
        let mut db = running_with_client(dir.path(), bin.path(), body).await;
        let dump = dir.path().join("dump.sql");
        std::fs::write(&dump, "SELECT 1;\n").unwrap();

        let result = db.populate(&dump, "sms").await;
        db.stop().await.unwrap();

        match result {
            Err(CertListError::Populate(text)) => {
                assert!(text.contains("processed 12 statements"));
                assert!(text.contains("ERROR 2006"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(unix)]
    async fn running_with_client(dir: &Path, bin: &Path, client_body: &str) -> MariaDb {
        let installer = script(bin, "install-db", "exit 0");
        let server = script(bin, "mariadbd", "exec sleep 30");
        let client = script(bin, "mariadb", client_body);
        let mut db = handle(dir, installed(server, client, installer));
        db.extract().unwrap();
        db.init().await.unwrap();
        db.start().await.unwrap();
        db
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_populate_pipes_dump_to_client() {
        let dir = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let received = dir.path().join("received.sql");
        let body = format!("cat > '{}'; exit 0", received.display());
        let mut db = running_with_client(dir.path(), bin.path(), &body).await;
        let dump = dir.path().join("noalerts.mysqldump");
        std::fs::write(&dump, "INSERT INTO T VALUES (1);\n").unwrap();

        let result = db.populate(&dump, "sms").await;
        db.stop().await.unwrap();

        result.unwrap();
        assert_eq!(
            std::fs::read_to_string(&received).unwrap(),
            "INSERT INTO T VALUES (1);\n"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_populate_suppresses_alerts_failure() {
        let dir = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let body = "cat > /dev/null; echo \"ERROR 1146 (42S02) at line 9: Table 'sms.alerts' doesn't exist\" >&2; exit 1";
        let mut db = running_with_client(dir.path(), bin.path(), body).await;
        let dump = dir.path().join("dump.sql");
        std::fs::write(&dump, "SELECT 1;\n").unwrap();

        let result = db.populate(&dump, "sms").await;
        db.stop().await.unwrap();
        result.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_populate_failure_keeps_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let body = "cat > /dev/null; echo 'ERROR 1064 (42000) at line 3: syntax error' >&2; exit 1";
        let mut db = running_with_client(dir.path(), bin.path(), body).await;
        let dump = dir.path().join("dump.sql");
        std::fs::write(&dump, "garbage;\n").unwrap();

        let result = db.populate(&dump, "sms").await;
        db.stop().await.unwrap();

        match result {
            Err(CertListError::Populate(text)) => assert!(text.contains("ERROR 1064")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
