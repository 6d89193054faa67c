//! Archive command implementation.

use std::fs;
use std::path::Path;

use docdump_core::archive;
use tracing::info;

/// Runs the archive command.
///
/// Compresses `dir` into a sibling `.zip` and removes the directory once
/// the archive is complete, the same replacement a full dump performs when
/// asked to archive its run.
pub fn run(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !dir.is_dir() {
        return Err(format!("Not a run directory: {}", dir.display()).into());
    }

    let archive_path = archive::zip_directory(dir)?;
    fs::remove_dir_all(dir)?;
    info!(archive = %archive_path.display(), "run directory archived");

    println!("Archived {} as {}", dir.display(), archive_path.display());
    Ok(())
}
