use crate::archive;
use crate::utils::errors::{CertListError, Result};
use crate::utils::paths::CertListPaths;
use std::path::{Path, PathBuf};

/// Default distribution archive name, resolved next to the executable
pub const DEFAULT_DISTRIBUTION_ZIP: &str = "mariadb-latest.zip";

const HOMEBREW_CLIENT: &str = "/opt/homebrew/bin/mariadb";
const HOMEBREW_SERVER: &str = "/opt/homebrew/bin/mariadbd";
const HOMEBREW_INSTALLER: &str = "/opt/homebrew/bin/mariadb-install-db";

/// Executable names looked up inside a distribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryNames {
    pub server: String,
    pub client: String,
    pub installer: String,
}

impl BinaryNames {
    /// Names shipped by the packaged archive for the current platform
    pub fn for_platform() -> Self {
        if cfg!(windows) {
            Self {
                server: "mysqld.exe".to_string(),
                client: "mysql.exe".to_string(),
                installer: "mysql_install_db.exe".to_string(),
            }
        } else {
            Self {
                server: "mariadbd".to_string(),
                client: "mariadb".to_string(),
                installer: "mariadb-install-db".to_string(),
            }
        }
    }
}

impl Default for BinaryNames {
    fn default() -> Self {
        Self::for_platform()
    }
}

/// Absolute paths of the three database executables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionPaths {
    pub server: PathBuf,
    pub client: PathBuf,
    pub installer: PathBuf,
}

impl DistributionPaths {
    pub fn is_complete(&self) -> bool {
        !self.server.as_os_str().is_empty()
            && !self.client.as_os_str().is_empty()
            && !self.installer.as_os_str().is_empty()
    }

    /// Fixed Homebrew locations used where the database ships pre-installed
    pub fn homebrew() -> Self {
        Self {
            server: PathBuf::from(HOMEBREW_SERVER),
            client: PathBuf::from(HOMEBREW_CLIENT),
            installer: PathBuf::from(HOMEBREW_INSTALLER),
        }
    }

    /// Resolve the binaries from PATH
    pub fn from_path(names: &BinaryNames) -> Result<Self> {
        let find = |name: &str| {
            which::which(name).map_err(|e| {
                CertListError::Config(format!("Cannot find {name} in PATH: {e}"))
            })
        };
        Ok(Self {
            server: find(&names.server)?,
            client: find(&names.client)?,
            installer: find(&names.installer)?,
        })
    }
}

/// Source of the database executables for one run
#[derive(Debug, Clone)]
pub enum Distribution {
    /// Packaged ZIP archive to unpack
    Archive { path: PathBuf, names: BinaryNames },
    /// Binaries already installed on the system
    Installed(DistributionPaths),
}

impl Distribution {
    /// Archive distribution, except on platforms where the database is
    /// installed natively
    pub fn for_platform(archive: PathBuf) -> Self {
        if cfg!(target_os = "macos") {
            Self::Installed(DistributionPaths::homebrew())
        } else {
            Self::Archive {
                path: archive,
                names: BinaryNames::for_platform(),
            }
        }
    }

    /// Produce the executable triple, extracting into `destination` when needed
    pub fn extract(&self, destination: &Path) -> Result<DistributionPaths> {
        match self {
            Self::Installed(paths) => {
                tracing::info!("Using pre-installed MariaDB at {}", paths.server.display());
                Ok(paths.clone())
            }
            Self::Archive { path, names } => extract_archive(path, destination, names),
        }
    }
}

fn extract_archive(
    archive: &Path,
    destination: &Path,
    names: &BinaryNames,
) -> Result<DistributionPaths> {
    CertListPaths::ensure_dir_exists(destination)?;
    tracing::debug!(
        "Unpacking {} into {}",
        archive.display(),
        destination.display()
    );

    let wanted = [
        names.client.as_str(),
        names.server.as_str(),
        names.installer.as_str(),
    ];
    let mut found = archive::unzip(archive, destination, &wanted)?.into_iter();

    let mut take = |name: &str| {
        found
            .next()
            .flatten()
            .ok_or_else(|| CertListError::BinaryNotFound {
                name: name.to_string(),
                archive: archive.to_path_buf(),
            })
    };
    let client = take(&names.client)?;
    let server = take(&names.server)?;
    let installer = take(&names.installer)?;

    Ok(DistributionPaths {
        server,
        client,
        installer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::write_zip;

    fn exe_names() -> BinaryNames {
        BinaryNames {
            server: "server.exe".to_string(),
            client: "client.exe".to_string(),
            installer: "installer.exe".to_string(),
        }
    }

    #[test]
    fn test_extract_archive_resolves_triple() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("mariadb.zip");
        write_zip(
            &archive,
            &[
                ("mariadb-11.7/bin/server.exe", b"s"),
                ("mariadb-11.7/bin/Client.EXE", b"c"),
                ("mariadb-11.7/bin/installer.exe", b"i"),
                ("mariadb-11.7/share/errmsg.sys", b"unrelated"),
            ],
        );
        let dest = dir.path().join("maria");
        let distribution = Distribution::Archive {
            path: archive,
            names: exe_names(),
        };

        let paths = distribution.extract(&dest).unwrap();

        assert!(paths.is_complete());
        assert_eq!(paths.server, dest.join("mariadb-11.7/bin/server.exe"));
        assert_eq!(paths.client, dest.join("mariadb-11.7/bin/Client.EXE"));
        assert_eq!(paths.installer, dest.join("mariadb-11.7/bin/installer.exe"));
        assert!(dest.join("mariadb-11.7/share/errmsg.sys").exists());
    }

    #[test]
    fn test_extract_archive_names_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("mariadb.zip");
        write_zip(
            &archive,
            &[("bin/server.exe", b"s"), ("bin/client.exe", b"c")],
        );
        let distribution = Distribution::Archive {
            path: archive,
            names: exe_names(),
        };

        let err = distribution.extract(&dir.path().join("maria")).unwrap_err();
        assert!(
            matches!(err, CertListError::BinaryNotFound { ref name, .. } if name == "installer.exe")
        );
    }

    #[test]
    fn test_installed_distribution_skips_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("never-created");
        let distribution = Distribution::Installed(DistributionPaths::homebrew());

        let paths = distribution.extract(&dest).unwrap();
        assert_eq!(paths, DistributionPaths::homebrew());
        assert!(!dest.exists());
    }

    #[test]
    fn test_incomplete_paths() {
        let mut paths = DistributionPaths::homebrew();
        assert!(paths.is_complete());
        paths.client = PathBuf::new();
        assert!(!paths.is_complete());
    }
}
