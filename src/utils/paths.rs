use crate::utils::errors::{CertListError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PROGRAM_NAME: &str = "certlist";
const WORK_DIR_PREFIX: &str = "cl-";
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Layout of one run's scratch directory
#[derive(Debug, Clone)]
pub struct WorkPaths {
    root: PathBuf,
}

impl WorkPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Extracted distribution: <work>/maria/
    pub fn maria_dir(&self) -> PathBuf {
        self.root.join("maria")
    }

    /// Database data directory: <work>/data/
    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Server error log: <work>/mariadb_error.log
    pub fn error_log(&self) -> PathBuf {
        self.root.join("mariadb_error.log")
    }

    /// Server pid file: <work>/mariadb.pid
    pub fn pid_file(&self) -> PathBuf {
        self.root.join("mariadb.pid")
    }
}

pub struct CertListPaths;

impl CertListPaths {
    /// Create a fresh `cl-*` work directory under `parent` (or the system temp dir)
    pub fn create_work_dir(parent: Option<&Path>) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORK_DIR_PREFIX);
        let dir = match parent {
            Some(parent) => {
                Self::ensure_dir_exists(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    /// Directory holding the running executable
    pub fn exe_dir() -> Result<PathBuf> {
        let exe = std::env::current_exe()?;
        exe.parent().map(Path::to_path_buf).ok_or_else(|| {
            CertListError::Config(format!("Cannot determine directory of {}", exe.display()))
        })
    }

    /// Per-user config directory: ~/.config/certlist/
    pub fn user_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(PROGRAM_NAME))
    }

    /// Candidate config files, most specific first
    pub fn config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(dir) = Self::exe_dir() {
            candidates.push(dir.join(CONFIG_FILE_NAME));
        }
        candidates.push(PathBuf::from(CONFIG_FILE_NAME));
        if let Some(dir) = Self::user_config_dir() {
            candidates.push(dir.join(CONFIG_FILE_NAME));
        }
        candidates
    }

    /// Resolve a relative path against the executable's directory
    pub fn beside_exe(path: &Path) -> Result<PathBuf> {
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        Ok(Self::exe_dir()?.join(path))
    }

    pub fn ensure_dir_exists(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_layout() {
        let paths = WorkPaths::new("/tmp/cl-abc");
        assert_eq!(paths.maria_dir(), PathBuf::from("/tmp/cl-abc/maria"));
        assert_eq!(paths.data_dir(), PathBuf::from("/tmp/cl-abc/data"));
        assert_eq!(
            paths.error_log(),
            PathBuf::from("/tmp/cl-abc/mariadb_error.log")
        );
        assert_eq!(paths.pid_file(), PathBuf::from("/tmp/cl-abc/mariadb.pid"));
    }

    #[test]
    fn test_create_work_dir_in_parent() {
        let parent = tempfile::tempdir().unwrap();
        let nested = parent.path().join("runs");
        let work = CertListPaths::create_work_dir(Some(&nested)).unwrap();

        assert!(work.path().starts_with(&nested));
        let name = work.path().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with(WORK_DIR_PREFIX));
    }

    #[test]
    fn test_beside_exe_keeps_absolute() {
        let abs = std::env::temp_dir().join("mariadb-latest.zip");
        assert_eq!(CertListPaths::beside_exe(&abs).unwrap(), abs);
    }
}
