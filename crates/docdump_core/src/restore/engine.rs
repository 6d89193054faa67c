//! Restore engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bson::{doc, Document};
use docdump_store::{CollectionHandle, DatabaseHandle, DatabaseRegistry, FindOptions};
use serde::Serialize;
use tracing::{debug, info};

use crate::archive;
use crate::error::CoreResult;
use crate::layout;
use crate::restore::file::RestoreFile;
use crate::restore::scan::{DumpTree, RestoreUnit};

/// Options for a restore run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreOptions {
    /// Drop each destination collection before restoring into it.
    /// Protected system collections are never dropped.
    pub drop_collections: bool,
    /// Replay captured log entries after the regular collections.
    pub oplog_replay: bool,
}

impl RestoreOptions {
    /// Creates the default options: no drop, no replay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables dropping destination collections first.
    #[must_use]
    pub fn with_drop(mut self) -> Self {
        self.drop_collections = true;
        self
    }

    /// Enables log replay.
    #[must_use]
    pub fn with_oplog_replay(mut self) -> Self {
        self.oplog_replay = true;
        self
    }
}

/// Result of a restore run.
#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    /// The plain directory the restore operated on (the expansion directory
    /// when the input was an archive).
    pub source: PathBuf,
    /// Regular-collection units restored.
    pub collections: u64,
    /// Documents upserted across regular units.
    pub documents: u64,
    /// Replay units applied; zero when replay was off or nothing matched.
    pub replay_units: u64,
    /// Log entries replayed.
    pub replayed_entries: u64,
}

/// Restores a dump tree into one database.
///
/// Restore is idempotent: documents are applied by upsert-by-identity, so
/// re-running the same dump converges to the same state. The run is a
/// single sequential pass; replay correctness depends on applying log
/// entries in capture order, which rules out parallelism here.
#[derive(Debug)]
pub struct Restore {
    registry: DatabaseRegistry,
    options: RestoreOptions,
}

impl Restore {
    /// Creates an engine over `registry` with the given options.
    #[must_use]
    pub fn new(registry: DatabaseRegistry, options: RestoreOptions) -> Self {
        Self { registry, options }
    }

    /// Creates an engine with default options.
    #[must_use]
    pub fn with_defaults(registry: DatabaseRegistry) -> Self {
        Self::new(registry, RestoreOptions::default())
    }

    /// Restores the dump tree or archive at `input` into `database`.
    ///
    /// Regular units apply first, in lexical path order; replay units apply
    /// afterwards, oldest capture first, each as one idempotent-application
    /// command filtered to the target database's namespaces.
    ///
    /// # Errors
    ///
    /// Returns the first unit's read or write failure; the destination is
    /// left in the partially restored state reached so far, and a re-run
    /// converges because application is idempotent.
    pub fn run(&self, input: &Path, database: &str) -> CoreResult<RestoreReport> {
        let handle = self.registry.get(database)?;
        let root = archive::materialize(input)?;
        let tree = DumpTree::scan(&root)?;
        info!(
            database,
            source = %root.display(),
            regular = tree.regular().len(),
            replay = tree.replay().len(),
            "starting restore"
        );

        let mut collections = 0u64;
        let mut documents = 0u64;
        for unit in tree.regular() {
            let name = unit.collection();
            if self.options.drop_collections && !layout::is_system_collection(name) {
                handle.drop_collection(name)?;
            }
            let collection = handle.collection(name)?;
            let file = RestoreFile::open(unit.path())?;
            let restored = if layout::is_user_collection(name) {
                self.merge_users(&collection, &file)?
            } else {
                self.upsert_all(&collection, &file)?
            };
            debug!(collection = name, restored, "collection restored");
            collections += 1;
            documents += restored;
        }

        let mut replay_units = 0u64;
        let mut replayed_entries = 0u64;
        if self.options.oplog_replay && !tree.replay().is_empty() {
            let admin = self.registry.admin()?;
            let prefix = format!("{database}.");
            for unit in tree.replay() {
                let applied = self.replay_unit(&admin, unit, &prefix)?;
                if applied > 0 {
                    replay_units += 1;
                    replayed_entries += applied;
                }
            }
        }

        info!(
            database,
            collections, documents, replay_units, replayed_entries, "restore finished"
        );
        Ok(RestoreReport {
            source: root,
            collections,
            documents,
            replay_units,
            replayed_entries,
        })
    }

    /// Upserts every document of `file` into `collection`, in file order.
    fn upsert_all(
        &self,
        collection: &Arc<dyn CollectionHandle>,
        file: &RestoreFile,
    ) -> CoreResult<u64> {
        let mut restored = 0u64;
        for document in file.documents()? {
            let document = document?;
            collection.save(&document)?;
            restored += 1;
        }
        Ok(restored)
    }

    /// Restores a user-authentication collection by merging: destination
    /// documents absent from the incoming set are removed first, then every
    /// incoming document is upserted. Absence is judged by whole-document
    /// comparison, not identity alone.
    fn merge_users(
        &self,
        collection: &Arc<dyn CollectionHandle>,
        file: &RestoreFile,
    ) -> CoreResult<u64> {
        let incoming = file.read_all()?;
        let existing: Vec<Document> = collection
            .find(None, &FindOptions::new())?
            .collect::<Result<_, _>>()?;

        let mut removed = 0u64;
        for current in &existing {
            if !incoming.contains(current) {
                removed += collection.remove(current)?;
            }
        }
        if removed > 0 {
            debug!(collection = collection.name(), removed, "stale users removed");
        }

        for document in &incoming {
            collection.save(document)?;
        }
        Ok(incoming.len() as u64)
    }

    /// Replays one capture unit: entries belonging to the target database
    /// are submitted as a single apply-operations command, preserving the
    /// unit's internal order. Returns the number of entries applied.
    fn replay_unit(
        &self,
        admin: &Arc<dyn DatabaseHandle>,
        unit: &RestoreUnit,
        prefix: &str,
    ) -> CoreResult<u64> {
        let file = RestoreFile::open(unit.path())?;
        let mut entries: Vec<Document> = Vec::new();
        for entry in file.documents()? {
            let entry = entry?;
            let matches = entry
                .get_str(layout::NAMESPACE_FIELD)
                .map(|ns| ns.starts_with(prefix))
                .unwrap_or(false);
            if matches {
                entries.push(entry);
            }
        }
        if entries.is_empty() {
            return Ok(0);
        }

        let applied = entries.len() as u64;
        admin.run_command(&doc! { "applyOps": entries })?;
        debug!(unit = unit.collection(), applied, "capture unit replayed");
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use bson::Timestamp;
    use docdump_store::MemoryDeployment;
    use std::fs::{self, File};
    use tempfile::tempdir;

    fn registry_for(deployment: &MemoryDeployment) -> DatabaseRegistry {
        DatabaseRegistry::builder()
            .database(deployment.database("admin"))
            .database(deployment.database("local"))
            .database(deployment.database("app"))
            .database(deployment.database("other"))
            .build()
    }

    fn write_unit(dir: &Path, file_name: &str, documents: &[Document]) {
        fs::create_dir_all(dir).unwrap();
        let mut file = File::create(dir.join(file_name)).unwrap();
        for document in documents {
            document.to_writer(&mut file).unwrap();
        }
    }

    fn all_documents(deployment: &MemoryDeployment, database: &str, name: &str) -> Vec<Document> {
        deployment
            .database(database)
            .collection(name)
            .unwrap()
            .find(None, &FindOptions::new().with_sort("_id", 1))
            .unwrap()
            .map(|d| d.unwrap())
            .collect()
    }

    fn log_entry(time: u32, increment: u32, ns: &str, op: &str, o: Document) -> Document {
        doc! {
            "ts": Timestamp { time, increment },
            "ns": ns,
            "op": op,
            "o": o,
        }
    }

    #[test]
    fn restore_upserts_every_document() {
        let temp = tempdir().unwrap();
        write_unit(
            temp.path(),
            "users.bson",
            &[doc! { "_id": 2, "name": "bob" }, doc! { "_id": 1, "name": "ada" }],
        );
        let deployment = MemoryDeployment::new();

        let engine = Restore::with_defaults(registry_for(&deployment));
        let report = engine.run(temp.path(), "app").unwrap();

        assert_eq!(report.collections, 1);
        assert_eq!(report.documents, 2);
        assert_eq!(report.replay_units, 0);
        let restored = all_documents(&deployment, "app", "users");
        assert_eq!(
            restored,
            vec![doc! { "_id": 1, "name": "ada" }, doc! { "_id": 2, "name": "bob" }]
        );
    }

    #[test]
    fn restoring_twice_converges_to_the_same_state() {
        let temp = tempdir().unwrap();
        write_unit(
            temp.path(),
            "users.bson",
            &[doc! { "_id": 1, "name": "ada" }, doc! { "_id": 2, "name": "bob" }],
        );
        let deployment = MemoryDeployment::new();
        let engine = Restore::with_defaults(registry_for(&deployment));

        engine.run(temp.path(), "app").unwrap();
        let first = all_documents(&deployment, "app", "users");
        engine.run(temp.path(), "app").unwrap();
        let second = all_documents(&deployment, "app", "users");

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn without_drop_existing_documents_survive() {
        let temp = tempdir().unwrap();
        write_unit(temp.path(), "users.bson", &[doc! { "_id": 1 }]);
        let deployment = MemoryDeployment::new();
        let registry = registry_for(&deployment);
        deployment
            .database("app")
            .collection("users")
            .unwrap()
            .insert(doc! { "_id": 9 })
            .unwrap();

        Restore::with_defaults(registry).run(temp.path(), "app").unwrap();

        let restored = all_documents(&deployment, "app", "users");
        assert_eq!(restored, vec![doc! { "_id": 1 }, doc! { "_id": 9 }]);
    }

    #[test]
    fn drop_replaces_existing_content() {
        let temp = tempdir().unwrap();
        write_unit(temp.path(), "users.bson", &[doc! { "_id": 1 }]);
        let deployment = MemoryDeployment::new();
        let registry = registry_for(&deployment);
        deployment
            .database("app")
            .collection("users")
            .unwrap()
            .insert(doc! { "_id": 9 })
            .unwrap();

        let engine = Restore::new(registry, RestoreOptions::new().with_drop());
        engine.run(temp.path(), "app").unwrap();

        assert_eq!(
            all_documents(&deployment, "app", "users"),
            vec![doc! { "_id": 1 }]
        );
    }

    #[test]
    fn system_collections_are_never_dropped() {
        let temp = tempdir().unwrap();
        write_unit(temp.path(), "system.indexes.bson", &[doc! { "_id": 1 }]);
        let deployment = MemoryDeployment::new();
        let registry = registry_for(&deployment);
        deployment
            .database("app")
            .collection("system.indexes")
            .unwrap()
            .insert(doc! { "_id": 9 })
            .unwrap();

        let engine = Restore::new(registry, RestoreOptions::new().with_drop());
        engine.run(temp.path(), "app").unwrap();

        // Dropping skipped the protected collection; the upsert added to it.
        assert_eq!(
            all_documents(&deployment, "app", "system.indexes"),
            vec![doc! { "_id": 1 }, doc! { "_id": 9 }]
        );
    }

    #[test]
    fn user_collection_merges_instead_of_appending() {
        let temp = tempdir().unwrap();
        let shared = doc! { "_id": "A", "pwd": "a-hash" };
        let incoming_only = doc! { "_id": "C", "pwd": "c-hash" };
        write_unit(
            temp.path(),
            "system.user.bson",
            &[shared.clone(), incoming_only.clone()],
        );

        let deployment = MemoryDeployment::new();
        let registry = registry_for(&deployment);
        let users = deployment.database("app").collection("system.user").unwrap();
        users.insert(shared.clone()).unwrap();
        users.insert(doc! { "_id": "B", "pwd": "b-hash" }).unwrap();

        Restore::with_defaults(registry).run(temp.path(), "app").unwrap();

        assert_eq!(
            all_documents(&deployment, "app", "system.user"),
            vec![shared, incoming_only]
        );
    }

    #[test]
    fn replay_applies_after_regular_collections() {
        let temp = tempdir().unwrap();
        write_unit(
            temp.path(),
            "users.bson",
            &[doc! { "_id": 1, "balance": 10 }],
        );
        write_unit(
            temp.path(),
            "oplog.2009-10-30-23-59.bson",
            &[log_entry(10, 1, "app.users", "u", doc! { "_id": 1, "balance": 99 })],
        );
        let deployment = MemoryDeployment::new();

        let engine = Restore::new(
            registry_for(&deployment),
            RestoreOptions::new().with_oplog_replay(),
        );
        let report = engine.run(temp.path(), "app").unwrap();

        assert_eq!(report.replay_units, 1);
        assert_eq!(report.replayed_entries, 1);
        // The replayed update landed on top of the restored document.
        assert_eq!(
            all_documents(&deployment, "app", "users"),
            vec![doc! { "_id": 1, "balance": 99 }]
        );
    }

    #[test]
    fn replay_is_skipped_unless_requested() {
        let temp = tempdir().unwrap();
        write_unit(
            temp.path(),
            "oplog.2009-10-30-23-59.bson",
            &[log_entry(10, 1, "app.users", "i", doc! { "_id": 1 })],
        );
        let deployment = MemoryDeployment::new();

        let report = Restore::with_defaults(registry_for(&deployment))
            .run(temp.path(), "app")
            .unwrap();

        assert_eq!(report.replay_units, 0);
        assert!(all_documents(&deployment, "app", "users").is_empty());
    }

    #[test]
    fn replay_filters_out_foreign_namespaces() {
        let temp = tempdir().unwrap();
        write_unit(
            temp.path(),
            "oplog.2009-10-30-23-59.bson",
            &[
                log_entry(10, 1, "app.users", "i", doc! { "_id": 1 }),
                log_entry(10, 2, "other.users", "i", doc! { "_id": 2 }),
            ],
        );
        let deployment = MemoryDeployment::new();

        let engine = Restore::new(
            registry_for(&deployment),
            RestoreOptions::new().with_oplog_replay(),
        );
        let report = engine.run(temp.path(), "app").unwrap();

        assert_eq!(report.replayed_entries, 1);
        assert_eq!(all_documents(&deployment, "app", "users").len(), 1);
        assert!(all_documents(&deployment, "other", "users").is_empty());
    }

    #[test]
    fn replay_units_apply_oldest_capture_first() {
        let temp = tempdir().unwrap();
        write_unit(
            temp.path(),
            "oplog.2010-01-02-00-04.bson",
            &[log_entry(20, 1, "app.users", "u", doc! { "_id": 1, "v": 2 })],
        );
        write_unit(
            temp.path(),
            "oplog.2009-10-30-23-59.bson",
            &[log_entry(10, 1, "app.users", "i", doc! { "_id": 1, "v": 1 })],
        );
        let deployment = MemoryDeployment::new();

        let engine = Restore::new(
            registry_for(&deployment),
            RestoreOptions::new().with_oplog_replay(),
        );
        engine.run(temp.path(), "app").unwrap();

        assert_eq!(
            all_documents(&deployment, "app", "users"),
            vec![doc! { "_id": 1, "v": 2 }]
        );
    }

    #[test]
    fn archive_input_is_expanded_first() {
        let temp = tempdir().unwrap();
        let run = temp.path().join("backup.2009-10-30-23-59");
        write_unit(&run, "users.bson", &[doc! { "_id": 1 }]);
        let archived = archive::zip_directory(&run).unwrap();
        fs::remove_dir_all(&run).unwrap();

        let deployment = MemoryDeployment::new();
        let report = Restore::with_defaults(registry_for(&deployment))
            .run(&archived, "app")
            .unwrap();

        assert_eq!(report.source, run);
        assert_eq!(
            all_documents(&deployment, "app", "users"),
            vec![doc! { "_id": 1 }]
        );
    }

    #[test]
    fn unreadable_unit_aborts_after_earlier_units_applied() {
        let temp = tempdir().unwrap();
        write_unit(temp.path(), "posts.bson", &[doc! { "_id": 1 }]);
        let mut truncated = Vec::new();
        doc! { "_id": 2 }.to_writer(&mut truncated).unwrap();
        truncated.truncate(truncated.len() - 2);
        fs::write(temp.path().join("users.bson"), &truncated).unwrap();

        let deployment = MemoryDeployment::new();
        let err = Restore::with_defaults(registry_for(&deployment))
            .run(temp.path(), "app")
            .unwrap_err();

        assert!(matches!(err, CoreError::Decode(_)));
        // Units before the failure stay applied; the restore is resumable
        // by re-running after the input is repaired.
        assert_eq!(all_documents(&deployment, "app", "posts").len(), 1);
    }

    #[test]
    fn empty_tree_restores_nothing() {
        let temp = tempdir().unwrap();
        let deployment = MemoryDeployment::new();

        let report = Restore::with_defaults(registry_for(&deployment))
            .run(temp.path(), "app")
            .unwrap();

        assert_eq!(report.collections, 0);
        assert_eq!(report.documents, 0);
    }
}
