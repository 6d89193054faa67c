//! Database and collection handle traits.

use std::sync::Arc;

use bson::Document;

use crate::error::StoreResult;

/// A streaming cursor over the documents matched by a query.
///
/// Cursors yield documents in the order chosen by the deployment, subject to
/// the sort requested in [`FindOptions`]. Each item is a `Result` so that a
/// cursor broken mid-stream surfaces the failure at the point it happened
/// rather than silently truncating.
pub type DocumentCursor = Box<dyn Iterator<Item = StoreResult<Document>> + Send>;

/// Query options applied to [`CollectionHandle::find`].
///
/// # Invariants
///
/// - At most one sort field is set; the engine only ever sorts by `_id`
///   ascending or `$natural` descending.
/// - `oplog_replay` is only meaningful on replication-log collections and
///   requires a filter with a lower timestamp bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Single-field sort, name and direction (`1` ascending, `-1` descending).
    pub sort: Option<(String, i32)>,
    /// Hint that the filter is a replication-log tail scan with a `ts` bound.
    pub oplog_replay: bool,
    /// Allow the read to be served by a non-primary member.
    pub secondary_reads: bool,
}

impl FindOptions {
    /// Creates options with no sort and no cursor flags.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorts results by the given field and direction.
    #[must_use]
    pub fn with_sort(mut self, field: impl Into<String>, direction: i32) -> Self {
        self.sort = Some((field.into(), direction));
        self
    }

    /// Marks the query as a replication-log tail scan.
    #[must_use]
    pub fn with_oplog_replay(mut self) -> Self {
        self.oplog_replay = true;
        self
    }

    /// Allows non-primary members to serve the read.
    #[must_use]
    pub fn with_secondary_reads(mut self) -> Self {
        self.secondary_reads = true;
        self
    }
}

/// A handle to one collection of a database.
///
/// # Invariants
///
/// - `save` upserts by the document's `_id`: a document with the identity of
///   an existing one replaces it, any other document is inserted.
/// - `remove` deletes exactly the documents matching **all** fields of the
///   given document.
/// - Handles must be `Send + Sync`; the dump engine shares them across
///   worker threads.
pub trait CollectionHandle: Send + Sync {
    /// Returns the collection name (without the database prefix).
    fn name(&self) -> &str;

    /// Opens a cursor over documents matching `filter` (all documents when
    /// `None`), honoring the sort and cursor flags in `options`.
    ///
    /// # Errors
    ///
    /// Returns an error if the filter uses an unsupported shape or the
    /// deployment rejects the query.
    fn find(&self, filter: Option<&Document>, options: &FindOptions) -> StoreResult<DocumentCursor>;

    /// Inserts a document without identity checks.
    ///
    /// # Errors
    ///
    /// Returns an error if the deployment rejects the write.
    fn insert(&self, document: Document) -> StoreResult<()>;

    /// Upserts a document by its `_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the deployment rejects the write.
    fn save(&self, document: &Document) -> StoreResult<()>;

    /// Removes documents matching all fields of `query`.
    ///
    /// Returns the number of documents removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the deployment rejects the delete.
    fn remove(&self, query: &Document) -> StoreResult<u64>;

    /// Returns the number of documents currently in the collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the count cannot be determined.
    fn count(&self) -> StoreResult<u64>;
}

/// A handle to one database of a deployment.
///
/// # Implementors
///
/// - [`super::MemoryDatabase`] - in-memory double used throughout the test
///   suites
pub trait DatabaseHandle: Send + Sync {
    /// Returns the database name.
    fn name(&self) -> &str;

    /// Lists collection names, excluding none; callers filter system
    /// collections themselves.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    fn collection_names(&self) -> StoreResult<Vec<String>>;

    /// Returns a handle to the named collection, creating it lazily if the
    /// deployment supports implicit creation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CollectionNotFound`] on a deployment without
    /// implicit creation, or another error if the collection cannot be
    /// opened.
    ///
    /// [`StoreError::CollectionNotFound`]: crate::StoreError::CollectionNotFound
    fn collection(&self, name: &str) -> StoreResult<Arc<dyn CollectionHandle>>;

    /// Drops the named collection. Dropping an absent collection is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error if the deployment rejects the drop.
    fn drop_collection(&self, name: &str) -> StoreResult<()>;

    /// Runs an administrative command and returns the reply document.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is unknown or the deployment reports
    /// failure.
    fn run_command(&self, command: &Document) -> StoreResult<Document>;
}
