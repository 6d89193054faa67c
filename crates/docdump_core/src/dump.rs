//! Full dump engine.
//!
//! A full dump snapshots every collection of one database into a
//! timestamped run directory, optionally captures the replication log for
//! point-in-time recovery, and optionally archives the finished run.
//!
//! The log window is anchored **before** any collection data is read: the
//! tail position recorded first becomes the lower bound of the capture that
//! runs after the collections finish. Entries overlapping the collection
//! snapshot are therefore captured rather than lost, and replay is safe
//! because application is idempotent.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use docdump_store::DatabaseRegistry;
use serde::Serialize;
use tracing::{debug, info};

use crate::archive;
use crate::error::CoreResult;
use crate::layout;
use crate::oplog::{self, OplogLocator};
use crate::pool::{CancelToken, WorkerPool};
use crate::task::CollectionDumpSpec;
use crate::writer::{BsonDumpWriter, DumpWriter};

/// Options for a full dump run.
#[derive(Debug, Clone)]
pub struct DumpOptions {
    /// Capture the replication log alongside collection data.
    pub oplog: bool,
    /// Compress the run directory after a successful dump.
    pub archive: bool,
    /// How long the join barrier waits for outstanding dump tasks.
    pub grace: Duration,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            oplog: false,
            archive: false,
            grace: Duration::from_secs(60),
        }
    }
}

impl DumpOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables replication-log capture.
    #[must_use]
    pub fn with_oplog(mut self) -> Self {
        self.oplog = true;
        self
    }

    /// Enables archiving of the finished run.
    #[must_use]
    pub fn with_archive(mut self) -> Self {
        self.archive = true;
        self
    }

    /// Overrides the join grace period.
    #[must_use]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }
}

/// Result of a full dump run.
#[derive(Debug, Clone, Serialize)]
pub struct DumpReport {
    /// The per-run output directory (removed when archiving succeeded).
    pub output_dir: PathBuf,
    /// Number of collections dumped.
    pub collections: u64,
    /// Total documents written across collection files.
    pub documents: u64,
    /// Log entries captured; zero when capture was not requested.
    pub oplog_entries: u64,
    /// The archive file, when archiving was requested and succeeded.
    pub archive: Option<PathBuf>,
}

/// Dumps one database into a timestamped run directory.
#[derive(Debug)]
pub struct FullDump {
    registry: DatabaseRegistry,
    options: DumpOptions,
    cancel: CancelToken,
}

impl FullDump {
    /// Creates an engine over `registry` with the given options.
    #[must_use]
    pub fn new(registry: DatabaseRegistry, options: DumpOptions) -> Self {
        Self {
            registry,
            options,
            cancel: CancelToken::new(),
        }
    }

    /// Creates an engine with default options.
    #[must_use]
    pub fn with_defaults(registry: DatabaseRegistry) -> Self {
        Self::new(registry, DumpOptions::default())
    }

    /// Returns the token that cancels a running dump.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs the dump.
    ///
    /// Collections are dumped by `workers` parallel tasks into
    /// `<output_root>/<dump_name>.<timestamp>/`. With log capture enabled,
    /// the log collection is resolved and the tail position recorded before
    /// any collection is read; the capture itself runs as one final
    /// single-threaded task. With archiving enabled, the run directory is
    /// compressed and removed only after the archive is complete.
    ///
    /// # Errors
    ///
    /// Returns the first task failure,
    /// [`crate::CoreError::UnsupportedNodeRole`] before anything is written
    /// when capture is requested on a node without a log,
    /// [`crate::CoreError::Interrupted`] on cancellation or grace expiry,
    /// and any store or I/O error. A failed run leaves completed collection
    /// files in place and is never archived.
    pub fn run(
        &self,
        output_root: &Path,
        database: &str,
        dump_name: &str,
        workers: usize,
    ) -> CoreResult<DumpReport> {
        let handle = self.registry.get(database)?;
        let started = Utc::now();
        let run_name = layout::timestamped(dump_name, started);
        let output_dir = output_root.join(&run_name);

        info!(database, run = %run_name, workers, "starting full dump");

        // Resolving the log up front makes an unsupported role fail the
        // run before a single byte is written.
        let capture = if self.options.oplog {
            let log = OplogLocator::new(self.registry.clone()).locate()?;
            let pattern = layout::namespace_pattern(database);
            let tail = oplog::latest_position(&log, &pattern)?;
            debug!(?tail, "anchored log capture window");
            Some((log, pattern, tail))
        } else {
            None
        };

        fs::create_dir_all(&output_dir)?;
        let writer: Arc<dyn DumpWriter> = Arc::new(BsonDumpWriter::new(&output_dir));

        let names = handle.collection_names()?;
        let collections = names.len() as u64;
        let mut pool = WorkerPool::with_cancel(workers, self.cancel.clone());
        for name in names {
            let collection = handle.collection(&name)?;
            let spec = CollectionDumpSpec::new(collection, Arc::clone(&writer));
            let token = self.cancel.clone();
            pool.submit(move || spec.run(&token));
        }
        let documents = pool.join(self.options.grace)?;

        let mut oplog_entries = 0;
        if let Some((log, pattern, tail)) = capture {
            self.cancel.check()?;
            let query = oplog::capture_query(&pattern, tail);
            let spec = CollectionDumpSpec::new(log, Arc::clone(&writer))
                .with_filter(query)
                .with_target(layout::oplog_target(started))
                .with_oplog_replay()
                .with_secondary_reads();
            oplog_entries = spec.run(&self.cancel)?;
        }

        let mut archive_path = None;
        if self.options.archive {
            self.cancel.check()?;
            let archived = archive::zip_directory(&output_dir)?;
            fs::remove_dir_all(&output_dir)?;
            archive_path = Some(archived);
        }

        info!(
            database,
            collections, documents, oplog_entries, "full dump finished"
        );
        Ok(DumpReport {
            output_dir,
            collections,
            documents,
            oplog_entries,
            archive: archive_path,
        })
    }
}
