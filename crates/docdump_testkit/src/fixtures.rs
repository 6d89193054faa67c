//! Deployment fixtures and dump-tree helpers.
//!
//! Provides convenience constructors for the node roles the engines
//! distinguish, seeded collections, replication-log entry factories, and
//! readers/writers for on-disk dump files.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use bson::{doc, Document, Timestamp};
use docdump_core::oplog::{MASTER_LOG, REPLICA_SET_LOG};
use docdump_store::{
    CollectionHandle, DatabaseRegistry, FindOptions, MemoryDeployment, ADMIN_DB, LOCAL_DB,
};

/// An in-memory deployment with a registry over its databases.
///
/// The administrative and node-local databases are always registered;
/// every constructor adds the databases named by the caller on top.
pub struct TestDeployment {
    /// The backing deployment.
    pub deployment: MemoryDeployment,
    /// Registry over the administrative, local, and named databases.
    pub registry: DatabaseRegistry,
    log_name: &'static str,
}

impl TestDeployment {
    /// Creates a standalone primary. Its log collection is the
    /// master log.
    pub fn standalone(databases: &[&str]) -> Self {
        Self::build(MemoryDeployment::new(), MASTER_LOG, databases)
    }

    /// Creates a replica-set member advertising one peer host. Its log
    /// collection is the replica-set log.
    pub fn replica(databases: &[&str]) -> Self {
        let deployment = MemoryDeployment::replica_member(vec!["node0:27017".to_string()]);
        Self::build(deployment, REPLICA_SET_LOG, databases)
    }

    /// Creates a standalone node that is not primary. Log capture against
    /// it fails with an unsupported-role error.
    pub fn secondary(databases: &[&str]) -> Self {
        Self::build(MemoryDeployment::secondary(), MASTER_LOG, databases)
    }

    fn build(deployment: MemoryDeployment, log_name: &'static str, databases: &[&str]) -> Self {
        let mut builder = DatabaseRegistry::builder()
            .database(deployment.database(ADMIN_DB))
            .database(deployment.database(LOCAL_DB));
        for name in databases {
            builder = builder.database(deployment.database(name));
        }
        Self {
            deployment,
            registry: builder.build(),
            log_name,
        }
    }

    /// Returns a handle to `collection` in `database`, creating both as
    /// needed.
    pub fn collection(&self, database: &str, collection: &str) -> Arc<dyn CollectionHandle> {
        self.deployment
            .database(database)
            .collection(collection)
            .expect("collection handle")
    }

    /// Inserts `documents` into `database.collection` in the given order.
    pub fn seed(&self, database: &str, collection: &str, documents: &[Document]) {
        let handle = self.collection(database, collection);
        for document in documents {
            handle.insert(document.clone()).expect("seed insert");
        }
    }

    /// Returns the documents of `database.collection` in identity order.
    pub fn documents(&self, database: &str, collection: &str) -> Vec<Document> {
        self.collection(database, collection)
            .find(None, &FindOptions::new().with_sort("_id", 1))
            .expect("find cursor")
            .map(|item| item.expect("cursor item"))
            .collect()
    }

    /// Appends one entry to this node's replication log.
    pub fn append_log(&self, entry: Document) {
        self.collection(LOCAL_DB, self.log_name)
            .insert(entry)
            .expect("log insert");
    }
}

/// Builds an insert log entry.
pub fn insert_entry(time: u32, increment: u32, ns: &str, document: Document) -> Document {
    doc! {
        "ts": Timestamp { time, increment },
        "ns": ns,
        "op": "i",
        "o": document,
    }
}

/// Builds an update log entry carrying the identity in `o2`.
pub fn update_entry(time: u32, increment: u32, ns: &str, query: Document, document: Document) -> Document {
    doc! {
        "ts": Timestamp { time, increment },
        "ns": ns,
        "op": "u",
        "o2": query,
        "o": document,
    }
}

/// Builds a delete log entry.
pub fn delete_entry(time: u32, increment: u32, ns: &str, query: Document) -> Document {
    doc! {
        "ts": Timestamp { time, increment },
        "ns": ns,
        "op": "d",
        "o": query,
    }
}

/// Writes `documents` as one dump file under `dir`, creating directories
/// as needed.
pub fn write_dump_unit(dir: &Path, file_name: &str, documents: &[Document]) {
    fs::create_dir_all(dir).expect("create dump directory");
    let mut file = File::create(dir.join(file_name)).expect("create dump file");
    for document in documents {
        document.to_writer(&mut file).expect("encode document");
    }
}

/// Reads a dump file back as its ordered documents.
pub fn read_dump_unit(path: &Path) -> Vec<Document> {
    let mut file = File::open(path).expect("open dump file");
    let mut documents = Vec::new();
    while let Ok(document) = Document::from_reader(&mut file) {
        documents.push(document);
    }
    documents
}
