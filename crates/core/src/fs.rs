//! Filesystem utilities used by the local partition store

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use log::info;

/// Create every missing parent directory of `path`.
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            info!("Created directory: {}", parent.display());
        }
    }
    Ok(())
}

/// Replace the file at `path` with `bytes`, creating parents as needed.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    ensure_parent_dir(path)?;
    fs::write(path, bytes)
}

/// Append `bytes` to the end of the file at `path`.
///
/// The file is created when missing; callers decide whether a header is
/// needed before appending.
pub fn append_bytes(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    ensure_parent_dir(path)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(bytes)?;
    file.flush()
}

/// Check if a path exists and is a regular file
pub fn path_exists(path: &Path) -> bool {
    path.is_file()
}
