//! Dump tree enumeration.

use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{CoreError, CoreResult};
use crate::layout;

/// What a dump file restores as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Documents of one collection, applied by upsert.
    Regular,
    /// Captured replication-log entries, applied by replay.
    Replay,
}

impl UnitKind {
    /// Classifies a unit by its collection name.
    #[must_use]
    pub fn of(collection: &str) -> Self {
        if layout::is_oplog_name(collection) {
            Self::Replay
        } else {
            Self::Regular
        }
    }
}

/// One dump file found in a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreUnit {
    path: PathBuf,
    collection: String,
    kind: UnitKind,
}

impl RestoreUnit {
    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the collection name derived from the file name.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the unit's classification.
    #[must_use]
    pub fn kind(&self) -> UnitKind {
        self.kind
    }
}

/// Every dump file under one plain directory, classified and ordered.
///
/// Regular units are ordered lexically by path, so a tree restores the same
/// way every time. Replay units are ordered oldest capture first: the
/// fixed-width timestamp in their names makes name order capture order.
#[derive(Debug)]
pub struct DumpTree {
    root: PathBuf,
    regular: Vec<RestoreUnit>,
    replay: Vec<RestoreUnit>,
}

impl DumpTree {
    /// Scans `root` recursively for dump files.
    ///
    /// Files without the dump extension, including checkpoints and nested
    /// archives, are ignored.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the tree cannot be walked, and
    /// [`CoreError::InvalidDump`] for a dump file whose name cannot name a
    /// collection.
    pub fn scan(root: &Path) -> CoreResult<Self> {
        let mut regular = Vec::new();
        let mut replay = Vec::new();

        for entry in WalkDir::new(root) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() || !layout::is_dump_file(entry.path()) {
                continue;
            }
            let file_name = entry.file_name().to_str().ok_or_else(|| {
                CoreError::invalid_dump(format!(
                    "unusable dump file name: {}",
                    entry.path().display()
                ))
            })?;
            let collection = layout::collection_name(file_name)
                .ok_or_else(|| {
                    CoreError::invalid_dump(format!("dump file has no extension: {file_name}"))
                })?
                .to_string();
            let kind = UnitKind::of(&collection);
            let unit = RestoreUnit {
                path: entry.path().to_path_buf(),
                collection,
                kind,
            };
            match kind {
                UnitKind::Regular => regular.push(unit),
                UnitKind::Replay => replay.push(unit),
            }
        }

        regular.sort_by(|a, b| a.path.cmp(&b.path));
        replay.sort_by(|a, b| {
            a.collection
                .cmp(&b.collection)
                .then_with(|| a.path.cmp(&b.path))
        });

        Ok(Self {
            root: root.to_path_buf(),
            regular,
            replay,
        })
    }

    /// Returns the scanned root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the regular-collection units, lexically ordered by path.
    #[must_use]
    pub fn regular(&self) -> &[RestoreUnit] {
        &self.regular
    }

    /// Returns the replay units, oldest capture first.
    #[must_use]
    pub fn replay(&self) -> &[RestoreUnit] {
        &self.replay
    }

    /// Returns true when the tree holds no dump files at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regular.is_empty() && self.replay.is_empty()
    }
}
