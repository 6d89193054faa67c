//! Checkpoint command implementation.

use std::path::Path;

use docdump_core::CheckpointFile;

/// Runs the checkpoint command.
///
/// Prints the persisted incremental position under `root`, or reports that
/// none exists. A checkpoint that is present but unreadable is the error
/// case; the next incremental run would refuse it too.
pub fn run(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let checkpoint = CheckpointFile::in_dir(root);
    match checkpoint.load()? {
        Some(position) => {
            println!("Checkpoint: {}", position);
            println!("File:       {}", checkpoint.path().display());
        }
        None => {
            println!("No checkpoint at {}", checkpoint.path().display());
        }
    }
    Ok(())
}
