use crate::utils::errors::Result;
use chrono::Utc;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

pub const CRASH_NOTE_FILE: &str = "error.txt";

/// Write a timestamped description of `error` and its sources to `dir/error.txt`
pub fn write_crash_note(dir: &Path, error: &dyn Error) -> Result<PathBuf> {
    let mut note = format!(
        "certlist failed at {}\n\nError: {error}\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    let mut source = error.source();
    while let Some(cause) = source {
        note.push_str(&format!("Caused by: {cause}\n"));
        source = cause.source();
    }

    let path = dir.join(CRASH_NOTE_FILE);
    fs::write(&path, note)?;
    Ok(path)
}
