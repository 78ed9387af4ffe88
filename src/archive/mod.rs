//! ZIP archive extraction shared by the distribution and backup stages

use crate::utils::errors::{CertListError, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

/// Extract every entry of `archive_path` into `destination`, preserving
/// relative paths.
///
/// Returns one slot per name in `wanted`; a slot holds the extracted path of
/// the file entry whose base name matches that name case-insensitively (the
/// last match wins). Extraction stops at the first entry that would land
/// outside `destination`.
pub fn unzip(
    archive_path: &Path,
    destination: &Path,
    wanted: &[&str],
) -> Result<Vec<Option<PathBuf>>> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut found = vec![None; wanted.len()];

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let target = resolve_inside(destination, entry.name())?;

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(base) = base_name(entry.name()) {
            for (slot, name) in found.iter_mut().zip(wanted) {
                if base.eq_ignore_ascii_case(name) {
                    *slot = Some(target.clone());
                }
            }
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        drop(out);

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))?;
        }

        tracing::trace!("Extracted {}", target.display());
    }

    Ok(found)
}

/// Copy the decompressed bytes of the entry named exactly `entry_name` to `output`
pub fn extract_file(archive_path: &Path, entry_name: &str, output: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    let mut entry = match archive.by_name(entry_name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(CertListError::EntryNotFound {
                entry: entry_name.to_string(),
                archive: archive_path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    let mut out = File::create(output)?;
    io::copy(&mut entry, &mut out)?;
    Ok(())
}

/// Join `name` onto `destination`, refusing anything that does not end up
/// strictly below it.
fn resolve_inside(destination: &Path, name: &str) -> Result<PathBuf> {
    let escape = || CertListError::PathTraversal {
        entry: name.to_string(),
        destination: destination.to_path_buf(),
    };

    let mut relative = PathBuf::new();
    for part in name.split(['/', '\\']) {
        match Path::new(part).components().next() {
            None | Some(Component::CurDir) => {}
            Some(Component::Normal(_)) if !part.contains(':') => relative.push(part),
            Some(Component::ParentDir) => {
                if !relative.pop() {
                    return Err(escape());
                }
            }
            _ => return Err(escape()),
        }
    }

    if name.starts_with(['/', '\\']) || relative.as_os_str().is_empty() {
        return Err(escape());
    }

    Ok(destination.join(relative))
}

fn base_name(name: &str) -> Option<&str> {
    name.rsplit(['/', '\\']).find(|part| !part.is_empty())
}
