use crate::archive;
use crate::utils::errors::{CertListError, Result};
use std::path::{Path, PathBuf};

/// SQL dump entry inside an SMS backup archive
pub const DUMP_ENTRY_NAME: &str = "noalerts.mysqldump";

/// Copy the SQL dump out of `backup` into a sibling file and return its path
pub fn extract_dump(backup: &Path) -> Result<PathBuf> {
    let folder = backup.parent().ok_or_else(|| {
        CertListError::InvalidInput(format!("Backup path has no parent: {}", backup.display()))
    })?;
    let dump = folder.join(DUMP_ENTRY_NAME);
    tracing::debug!("Extracting {DUMP_ENTRY_NAME} to {}", dump.display());
    archive::extract_file(backup, DUMP_ENTRY_NAME, &dump)?;
    Ok(dump)
}
