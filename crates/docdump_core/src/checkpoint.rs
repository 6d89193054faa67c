//! Incremental checkpoint persistence.
//!
//! The incremental engine remembers how far it has captured the replication
//! log in a single text file under the output root. The file holds one
//! [`LogPosition`] in its `<seconds>|<sequence>` encoding. An absent file
//! means capture starts from the beginning of the log; an unreadable value
//! is a hard failure so that a damaged checkpoint never silently turns an
//! incremental pass into a full one.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};
use crate::types::LogPosition;

/// Name of the checkpoint file under the output root.
pub const CHECKPOINT_FILE: &str = "incremental_last_timestamp.txt";

/// The persisted position of the last captured log entry.
#[derive(Debug, Clone)]
pub struct CheckpointFile {
    path: PathBuf,
}

impl CheckpointFile {
    /// Returns the checkpoint living under `output_root`.
    #[must_use]
    pub fn in_dir(output_root: &Path) -> Self {
        Self {
            path: output_root.join(CHECKPOINT_FILE),
        }
    }

    /// Returns the checkpoint at an explicit path.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the checkpoint file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted position.
    ///
    /// Returns `None` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CheckpointCorrupt`] if the file exists but does
    /// not hold a valid position, and an I/O error if it cannot be read.
    pub fn load(&self) -> CoreResult<Option<LogPosition>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        let position = text
            .trim()
            .parse::<LogPosition>()
            .map_err(|e| CoreError::checkpoint_corrupt(&self.path, e.to_string()))?;
        Ok(Some(position))
    }

    /// Persists `position`, replacing any previous value atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn store(&self, position: LogPosition) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a crash never leaves a half-written value.
        let temp_path = self.path.with_extension("txt.tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(position.to_string().as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}
