//! Dump file writers.
//!
//! A [`DumpWriter`] turns a stream of documents into files under an output
//! root. The engines depend on the trait only; the single concrete format is
//! [`BsonDumpWriter`], which appends each document's native binary encoding
//! to `<root>/<target>.bson`. Documents are self-delimiting, so the file
//! needs no framing between them.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use bson::Document;
use parking_lot::Mutex;

use crate::error::CoreResult;
use crate::layout;

/// Destination for the dump files of one run.
///
/// # Invariants
///
/// - `write_document` appends; a target's file only ever grows within a run
/// - Repeated writes to one target land in one file, in call order
/// - Writers must be `Send + Sync`; the engine shares one writer across
///   worker threads, with distinct targets per worker
pub trait DumpWriter: Send + Sync {
    /// Returns the file extension this writer produces (without the dot).
    fn extension(&self) -> &str;

    /// Returns the path where documents for `target` are written.
    fn file_path(&self, target: &str) -> PathBuf;

    /// Appends one document to the file for `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or the document cannot
    /// be encoded or written.
    fn write_document(&self, target: &str, document: &Document) -> CoreResult<()>;
}

/// Writes dump files in the store's native binary document format.
///
/// Files are created lazily on the first document for a target, including
/// any missing parent directories. One open handle is cached per target for
/// the writer's lifetime.
pub struct BsonDumpWriter {
    output_root: PathBuf,
    files: Mutex<HashMap<String, BufWriter<File>>>,
}

impl BsonDumpWriter {
    /// Creates a writer rooted at `output_root`.
    #[must_use]
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            files: Mutex::new(HashMap::new()),
        }
    }
}

impl DumpWriter for BsonDumpWriter {
    fn extension(&self) -> &str {
        layout::DUMP_EXTENSION
    }

    fn file_path(&self, target: &str) -> PathBuf {
        layout::dump_file_path(&self.output_root, target, layout::DUMP_EXTENSION)
    }

    fn write_document(&self, target: &str, document: &Document) -> CoreResult<()> {
        let mut files = self.files.lock();
        let writer = match files.entry(target.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let path = layout::dump_file_path(&self.output_root, target, layout::DUMP_EXTENSION);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let file = OpenOptions::new().create(true).append(true).open(&path)?;
                entry.insert(BufWriter::new(file))
            }
        };
        document.to_writer(&mut *writer)?;
        // Flushed per document: an engine that records the last written
        // position must find that entry in the file after a crash.
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for BsonDumpWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BsonDumpWriter")
            .field("output_root", &self.output_root)
            .finish_non_exhaustive()
    }
}
