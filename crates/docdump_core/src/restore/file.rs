//! Dump file reader.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use bson::Document;

use crate::error::{CoreError, CoreResult};
use crate::layout;

/// One dump file opened for restoring.
///
/// The collection a file restores into is derived from its name by
/// stripping the format extension; the content is the concatenation of
/// self-delimiting documents in write order.
#[derive(Debug)]
pub struct RestoreFile {
    path: PathBuf,
    collection: String,
}

impl RestoreFile {
    /// Opens `path` as a dump file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDump`] when the file name does not carry
    /// a collection name and an extension.
    pub fn open(path: impl Into<PathBuf>) -> CoreResult<Self> {
        let path = path.into();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                CoreError::invalid_dump(format!("unusable dump file name: {}", path.display()))
            })?;
        let collection = layout::collection_name(file_name)
            .ok_or_else(|| {
                CoreError::invalid_dump(format!("dump file has no extension: {file_name}"))
            })?
            .to_string();
        Ok(Self { path, collection })
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the collection this file restores into.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Streams the file's documents in file order.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened. Decode failures,
    /// including a document truncated mid-file, surface as items of the
    /// iterator.
    pub fn documents(&self) -> CoreResult<Documents> {
        let file = File::open(&self.path)?;
        Ok(Documents {
            reader: BufReader::new(file),
        })
    }

    /// Reads the whole file into memory, in file order.
    ///
    /// # Errors
    ///
    /// Returns the first open, read, or decode error.
    pub fn read_all(&self) -> CoreResult<Vec<Document>> {
        self.documents()?.collect()
    }
}

/// Iterator over the documents of one dump file.
pub struct Documents {
    reader: BufReader<File>,
}

impl Iterator for Documents {
    type Item = CoreResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        // Only a clean boundary between documents is end-of-file; running
        // out of bytes inside a document is a decode error.
        match self.reader.fill_buf() {
            Ok(buffer) if buffer.is_empty() => return None,
            Ok(_) => {}
            Err(error) => return Some(Err(error.into())),
        }
        Some(Document::from_reader(&mut self.reader).map_err(CoreError::from))
    }
}

impl std::fmt::Debug for Documents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Documents").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_documents(path: &Path, documents: &[Document]) {
        let mut file = File::create(path).unwrap();
        for document in documents {
            document.to_writer(&mut file).unwrap();
        }
        file.flush().unwrap();
    }

    #[test]
    fn reads_documents_in_file_order() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("users.bson");
        let documents = vec![
            doc! { "_id": 3, "name": "carol" },
            doc! { "_id": 1, "name": "ada" },
            doc! { "_id": 2, "name": "bob" },
        ];
        write_documents(&path, &documents);

        let file = RestoreFile::open(&path).unwrap();
        assert_eq!(file.collection(), "users");
        assert_eq!(file.read_all().unwrap(), documents);
    }

    #[test]
    fn nested_and_binary_values_round_trip() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("blobs.bson");
        let original = doc! {
            "_id": 1,
            "nested": { "values": [1, 2, 3], "label": "x" },
            "payload": bson::Binary {
                subtype: bson::spec::BinarySubtype::Generic,
                bytes: vec![0, 1, 2, 255],
            },
        };
        write_documents(&path, std::slice::from_ref(&original));

        let file = RestoreFile::open(&path).unwrap();
        assert_eq!(file.read_all().unwrap(), vec![original]);
    }

    #[test]
    fn empty_file_yields_no_documents() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("empty.bson");
        fs::write(&path, b"").unwrap();

        let file = RestoreFile::open(&path).unwrap();
        assert!(file.read_all().unwrap().is_empty());
    }

    #[test]
    fn truncated_document_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("cut.bson");
        let mut bytes = Vec::new();
        doc! { "_id": 1, "name": "ada" }
            .to_writer(&mut bytes)
            .unwrap();
        bytes.truncate(bytes.len() - 3);
        fs::write(&path, &bytes).unwrap();

        let file = RestoreFile::open(&path).unwrap();
        assert!(file.read_all().is_err());
    }

    #[test]
    fn collection_name_keeps_embedded_dots() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("oplog.2009-10-30-23-59.bson");
        fs::write(&path, b"").unwrap();

        let file = RestoreFile::open(&path).unwrap();
        assert_eq!(file.collection(), "oplog.2009-10-30-23-59");
    }

    #[test]
    fn name_without_extension_is_rejected() {
        let err = RestoreFile::open("/tmp/plainname").unwrap_err();
        assert!(matches!(err, CoreError::InvalidDump { .. }));
    }
}
