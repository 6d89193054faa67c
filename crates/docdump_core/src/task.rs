//! Collection dump tasks.
//!
//! One task streams one collection into one dump file. Regular collections
//! are forced into identity order so that re-running a dump produces a
//! deterministic prefix; replication-log captures keep the log's own order,
//! which is the order replay depends on.

use std::sync::Arc;

use bson::Document;
use docdump_store::{CollectionHandle, FindOptions};
use tracing::debug;

use crate::error::CoreResult;
use crate::layout;
use crate::pool::CancelToken;
use crate::writer::DumpWriter;

/// Dumps one collection into one destination file.
///
/// Immutable once built; the engine creates one spec per collection per run
/// and hands it to a worker.
pub struct CollectionDumpSpec {
    collection: Arc<dyn CollectionHandle>,
    writer: Arc<dyn DumpWriter>,
    filter: Option<Document>,
    cursor: FindOptions,
    target: Option<String>,
    keep_source_order: bool,
}

impl CollectionDumpSpec {
    /// Creates a spec that dumps all of `collection` through `writer` under
    /// the collection's own name, in identity order.
    #[must_use]
    pub fn new(collection: Arc<dyn CollectionHandle>, writer: Arc<dyn DumpWriter>) -> Self {
        Self {
            collection,
            writer,
            filter: None,
            cursor: FindOptions::new(),
            target: None,
            keep_source_order: false,
        }
    }

    /// Restricts the dump to documents matching `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: Document) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Writes under `target` instead of the collection name.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Marks the task as a replication-log capture: the replay cursor flag
    /// is set and entries keep the log's own order instead of the identity
    /// sort.
    #[must_use]
    pub fn with_oplog_replay(mut self) -> Self {
        self.cursor = self.cursor.clone().with_oplog_replay();
        self.keep_source_order = true;
        self
    }

    /// Allows the read to be served by a non-primary member.
    #[must_use]
    pub fn with_secondary_reads(mut self) -> Self {
        self.cursor = self.cursor.clone().with_secondary_reads();
        self
    }

    /// Returns the destination name documents are written under.
    #[must_use]
    pub fn target(&self) -> &str {
        self.target.as_deref().unwrap_or_else(|| self.collection.name())
    }

    /// Streams the collection into the writer.
    ///
    /// Returns the number of documents written. The cancel token is checked
    /// between documents; nothing is buffered, so a failure leaves the
    /// documents written so far in place.
    ///
    /// # Errors
    ///
    /// Propagates cursor and writer errors, and returns
    /// [`crate::CoreError::Interrupted`] if `cancel` trips mid-stream.
    pub fn run(&self, cancel: &CancelToken) -> CoreResult<u64> {
        let mut options = self.cursor.clone();
        if !self.keep_source_order {
            options = options.with_sort(layout::ID_FIELD, 1);
        }

        let target = self.target();
        let cursor = self.collection.find(self.filter.as_ref(), &options)?;
        let mut written = 0u64;
        for document in cursor {
            cancel.check()?;
            let document = document?;
            self.writer.write_document(target, &document)?;
            written += 1;
        }
        debug!(
            collection = self.collection.name(),
            target, written, "collection dumped"
        );
        Ok(written)
    }
}

impl std::fmt::Debug for CollectionDumpSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionDumpSpec")
            .field("collection", &self.collection.name())
            .field("target", &self.target())
            .field("keep_source_order", &self.keep_source_order)
            .finish_non_exhaustive()
    }
}
