//! Incremental dump engine.
//!
//! An incremental dump captures the slice of the replication log written
//! since the previous run, straight into `oplog.<timestamp>.bson` under the
//! output root. Progress is remembered in the checkpoint file: the next run
//! resumes strictly after the last entry the previous run durably wrote, so
//! repeated runs never skip an entry and at worst re-read entries whose
//! checkpoint write was lost.
//!
//! The pass is strictly single-threaded. Entries are written in the log's
//! own order, which is the order replay depends on.

use std::path::{Path, PathBuf};

use chrono::Utc;
use docdump_store::{DatabaseRegistry, FindOptions};
use serde::Serialize;
use tracing::info;

use crate::checkpoint::CheckpointFile;
use crate::error::{CoreError, CoreResult};
use crate::layout;
use crate::oplog::{self, OplogLocator};
use crate::types::LogPosition;
use crate::writer::{BsonDumpWriter, DumpWriter};

/// Result of an incremental dump run.
#[derive(Debug, Clone, Serialize)]
pub struct IncrementalReport {
    /// Log entries written during this run.
    pub entries: u64,
    /// The capture file, present when at least one entry was written.
    pub file: Option<PathBuf>,
    /// The checkpoint after this run: the position of the last entry
    /// written, or the previous checkpoint when nothing matched.
    pub checkpoint: Option<LogPosition>,
}

/// Captures replication-log entries for a set of databases.
#[derive(Debug)]
pub struct IncrementalDump {
    registry: DatabaseRegistry,
    databases: Vec<String>,
    checkpoint_path: Option<PathBuf>,
}

impl IncrementalDump {
    /// Creates an engine capturing entries for `databases`.
    #[must_use]
    pub fn new(registry: DatabaseRegistry, databases: Vec<String>) -> Self {
        Self {
            registry,
            databases,
            checkpoint_path: None,
        }
    }

    /// Stores the checkpoint at an explicit path instead of
    /// `incremental_last_timestamp.txt` under the output root.
    #[must_use]
    pub fn with_checkpoint_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = Some(path.into());
        self
    }

    /// Runs one capture pass into `output_root`.
    ///
    /// The first run has no checkpoint and captures from the start of the
    /// currently retained log. Later runs bound the query strictly above
    /// the checkpoint and ask the log for replay-cursor semantics, which
    /// keeps the cursor valid while the capped log advances underneath it.
    ///
    /// When the pass fails after writing at least one entry, the checkpoint
    /// is still moved to the last written position before the error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingDatabase`] for a selected database that
    /// is not registered, [`CoreError::CheckpointCorrupt`] for an
    /// unreadable checkpoint, [`CoreError::UnsupportedNodeRole`] when the
    /// node has no log, and any store or I/O error from the pass itself.
    pub fn run(&self, output_root: &Path) -> CoreResult<IncrementalReport> {
        for database in &self.databases {
            if !self.registry.contains(database) {
                return Err(CoreError::missing_database(database));
            }
        }

        let checkpoint_file = match &self.checkpoint_path {
            Some(path) => CheckpointFile::at(path.clone()),
            None => CheckpointFile::in_dir(output_root),
        };
        let previous = checkpoint_file.load()?;

        let log = OplogLocator::new(self.registry.clone()).locate()?;
        let pattern = layout::multi_namespace_pattern(&self.databases);
        let query = oplog::capture_query(&pattern, previous);
        let mut options = FindOptions::new();
        if previous.is_some() {
            options = options.with_oplog_replay();
        }

        let started = Utc::now();
        let target = layout::oplog_target(started);
        let writer = BsonDumpWriter::new(output_root);
        info!(
            databases = ?self.databases,
            checkpoint = ?previous,
            "starting incremental dump"
        );

        let cursor = log.find(Some(&query), &options)?;
        let mut entries = 0u64;
        let mut last_written: Option<LogPosition> = None;
        let mut failure: Option<CoreError> = None;
        for next in cursor {
            let entry = match next {
                Ok(entry) => entry,
                Err(error) => {
                    failure = Some(error.into());
                    break;
                }
            };
            let position = match oplog::entry_position(&entry) {
                Ok(position) => position,
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            };
            if let Err(error) = writer.write_document(&target, &entry) {
                failure = Some(error);
                break;
            }
            last_written = Some(position);
            entries += 1;
        }

        // Progress written so far survives the failure of the pass.
        if let Some(position) = last_written {
            if let Err(error) = checkpoint_file.store(position) {
                if failure.is_none() {
                    failure = Some(error);
                }
            }
        }
        if let Some(error) = failure {
            return Err(error);
        }

        info!(entries, checkpoint = ?last_written.or(previous), "incremental dump finished");
        Ok(IncrementalReport {
            entries,
            file: (entries > 0).then(|| writer.file_path(&target)),
            checkpoint: last_written.or(previous),
        })
    }
}
