//! In-memory deployment for testing.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use bson::{doc, Bson, Document};
use parking_lot::RwLock;
use regex::Regex;

use crate::error::{StoreError, StoreResult};
use crate::handle::{CollectionHandle, DatabaseHandle, DocumentCursor, FindOptions};

type SharedDatabases = Arc<RwLock<BTreeMap<String, Arc<MemoryDatabase>>>>;

/// Node role reported by the `ismaster` command.
#[derive(Debug, Clone)]
struct RoleConfig {
    primary: bool,
    hosts: Option<Vec<String>>,
}

/// An in-memory deployment of databases and collections.
///
/// This deployment stores all documents in memory and is suitable for:
/// - Unit tests
/// - Integration tests exercising dump and restore end to end
///
/// It evaluates exactly the query surface the engines use: equality filters,
/// `$gt` bounds, regular-expression matches, `_id` and `$natural` sorts, and
/// the administrative commands `ismaster` and `applyOps`.
///
/// # Thread Safety
///
/// Handles are thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use bson::doc;
/// use docdump_store::MemoryDeployment;
///
/// let deployment = MemoryDeployment::new();
/// let db = deployment.database("app");
/// let users = db.collection("users").unwrap();
/// users.insert(doc! { "_id": 1, "name": "ada" }).unwrap();
/// assert_eq!(users.count().unwrap(), 1);
/// ```
#[derive(Debug)]
pub struct MemoryDeployment {
    databases: SharedDatabases,
    role: RoleConfig,
}

impl MemoryDeployment {
    /// Creates a standalone deployment that reports itself as primary.
    #[must_use]
    pub fn new() -> Self {
        Self::with_role(true, None)
    }

    /// Creates a deployment that reports replica-set membership with the
    /// given host list.
    #[must_use]
    pub fn replica_member(hosts: Vec<String>) -> Self {
        Self::with_role(true, Some(hosts))
    }

    /// Creates a standalone deployment that reports itself as non-primary.
    ///
    /// Log capture is unsupported on such a node; useful for testing the
    /// locator's failure path.
    #[must_use]
    pub fn secondary() -> Self {
        Self::with_role(false, None)
    }

    fn with_role(primary: bool, hosts: Option<Vec<String>>) -> Self {
        Self {
            databases: Arc::new(RwLock::new(BTreeMap::new())),
            role: RoleConfig { primary, hosts },
        }
    }

    /// Returns a handle to the named database, creating it if absent.
    #[must_use]
    pub fn database(&self, name: &str) -> Arc<dyn DatabaseHandle> {
        open_database(&self.databases, &self.role, name)
    }
}

impl Default for MemoryDeployment {
    fn default() -> Self {
        Self::new()
    }
}

fn open_database(
    databases: &SharedDatabases,
    role: &RoleConfig,
    name: &str,
) -> Arc<MemoryDatabase> {
    let mut map = databases.write();
    map.entry(name.to_string())
        .or_insert_with(|| {
            Arc::new(MemoryDatabase {
                name: name.to_string(),
                collections: RwLock::new(BTreeMap::new()),
                databases: Arc::clone(databases),
                role: role.clone(),
            })
        })
        .clone()
}

/// One database of a [`MemoryDeployment`].
#[derive(Debug)]
pub struct MemoryDatabase {
    name: String,
    collections: RwLock<BTreeMap<String, Arc<MemoryCollection>>>,
    databases: SharedDatabases,
    role: RoleConfig,
}

impl MemoryDatabase {
    fn apply_ops(&self, entries: &[Bson]) -> StoreResult<Document> {
        let mut applied = 0i64;
        for entry in entries {
            let entry = entry.as_document().ok_or_else(|| {
                StoreError::command_failed("applyOps", "log entry is not a document")
            })?;
            self.apply_entry(entry)?;
            applied += 1;
        }
        Ok(doc! { "applied": applied, "ok": 1 })
    }

    fn apply_entry(&self, entry: &Document) -> StoreResult<()> {
        let ns = entry
            .get_str("ns")
            .map_err(|_| StoreError::command_failed("applyOps", "log entry missing ns"))?;
        let op = entry
            .get_str("op")
            .map_err(|_| StoreError::command_failed("applyOps", "log entry missing op"))?;
        let (db_name, coll_name) = ns.split_once('.').ok_or_else(|| {
            StoreError::command_failed("applyOps", format!("malformed namespace: {ns}"))
        })?;

        let database = open_database(&self.databases, &self.role, db_name);
        let collection = database.collection(coll_name)?;
        match op {
            "i" => {
                let document = entry.get_document("o").map_err(|_| {
                    StoreError::command_failed("applyOps", "insert entry missing o")
                })?;
                collection.save(document)?;
            }
            "u" => {
                let mut document = entry
                    .get_document("o")
                    .map_err(|_| {
                        StoreError::command_failed("applyOps", "update entry missing o")
                    })?
                    .clone();
                // Update entries carry the identity in o2.
                if !document.contains_key("_id") {
                    if let Ok(query) = entry.get_document("o2") {
                        if let Some(id) = query.get("_id") {
                            document.insert("_id", id.clone());
                        }
                    }
                }
                collection.save(&document)?;
            }
            "d" => {
                let query = entry.get_document("o").map_err(|_| {
                    StoreError::command_failed("applyOps", "delete entry missing o")
                })?;
                collection.remove(query)?;
            }
            "n" => {}
            other => {
                return Err(StoreError::command_failed(
                    "applyOps",
                    format!("unsupported operation type: {other}"),
                ));
            }
        }
        Ok(())
    }
}

impl DatabaseHandle for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn collection_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.collections.read().keys().cloned().collect())
    }

    fn collection(&self, name: &str) -> StoreResult<Arc<dyn CollectionHandle>> {
        let mut map = self.collections.write();
        let collection = map
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(MemoryCollection {
                    name: name.to_string(),
                    documents: RwLock::new(Vec::new()),
                })
            })
            .clone();
        Ok(collection)
    }

    fn drop_collection(&self, name: &str) -> StoreResult<()> {
        self.collections.write().remove(name);
        Ok(())
    }

    fn run_command(&self, command: &Document) -> StoreResult<Document> {
        let Some((name, _)) = command.iter().next() else {
            return Err(StoreError::command_failed("<empty>", "empty command"));
        };
        match name.as_str() {
            "ismaster" | "isMaster" => {
                let mut reply = doc! { "ismaster": self.role.primary, "ok": 1 };
                if let Some(hosts) = &self.role.hosts {
                    let hosts: Vec<Bson> =
                        hosts.iter().map(|h| Bson::String(h.clone())).collect();
                    reply.insert("hosts", hosts);
                }
                Ok(reply)
            }
            "applyOps" => {
                let entries = command.get_array("applyOps").map_err(|_| {
                    StoreError::command_failed("applyOps", "expected an array of log entries")
                })?;
                self.apply_ops(entries)
            }
            other => Err(StoreError::command_failed(other, "unknown command")),
        }
    }
}

/// One collection of a [`MemoryDatabase`].
///
/// Documents keep insertion order; `$natural` sorts expose it directly.
#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    documents: RwLock<Vec<Document>>,
}

impl CollectionHandle for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, filter: Option<&Document>, options: &FindOptions) -> StoreResult<DocumentCursor> {
        let documents = self.documents.read();
        let mut results = Vec::new();
        for document in documents.iter() {
            let matched = match filter {
                Some(filter) => matches_filter(document, filter)?,
                None => true,
            };
            if matched {
                results.push(document.clone());
            }
        }
        drop(documents);

        if let Some((field, direction)) = &options.sort {
            if field == "$natural" {
                if *direction < 0 {
                    results.reverse();
                }
            } else {
                let field = field.clone();
                results.sort_by(|a, b| {
                    let left = a.get(&field).unwrap_or(&Bson::Null);
                    let right = b.get(&field).unwrap_or(&Bson::Null);
                    bson_cmp(left, right)
                });
                if *direction < 0 {
                    results.reverse();
                }
            }
        }

        Ok(Box::new(results.into_iter().map(Ok)))
    }

    fn insert(&self, document: Document) -> StoreResult<()> {
        self.documents.write().push(document);
        Ok(())
    }

    fn save(&self, document: &Document) -> StoreResult<()> {
        let mut documents = self.documents.write();
        if let Some(id) = document.get("_id") {
            for existing in documents.iter_mut() {
                if existing.get("_id") == Some(id) {
                    *existing = document.clone();
                    return Ok(());
                }
            }
        }
        documents.push(document.clone());
        Ok(())
    }

    fn remove(&self, query: &Document) -> StoreResult<u64> {
        let mut documents = self.documents.write();
        let before = documents.len();
        let mut kept = Vec::with_capacity(before);
        for document in documents.drain(..) {
            if matches_filter(&document, query)? {
                continue;
            }
            kept.push(document);
        }
        let removed = (before - kept.len()) as u64;
        *documents = kept;
        Ok(removed)
    }

    fn count(&self) -> StoreResult<u64> {
        Ok(self.documents.read().len() as u64)
    }
}

/// Evaluates `filter` against `document`.
///
/// Supported shapes: field equality, `{ "$gt": bound }`, `{ "$regex": pattern }`,
/// and a top-level regular-expression value. Everything else is rejected so
/// that a test relying on unsupported semantics fails loudly.
fn matches_filter(document: &Document, filter: &Document) -> StoreResult<bool> {
    for (field, condition) in filter {
        let value = document.get(field);
        let matched = match condition {
            Bson::Document(operators) if is_operator_doc(operators) => {
                let mut all = true;
                for (op, bound) in operators {
                    let holds = match op.as_str() {
                        "$gt" => match value {
                            Some(value) => bson_cmp(value, bound) == Ordering::Greater,
                            None => false,
                        },
                        "$regex" => {
                            let pattern = bound.as_str().ok_or_else(|| {
                                StoreError::invalid_filter("$regex pattern must be a string")
                            })?;
                            regex_matches(pattern, value)?
                        }
                        other => {
                            return Err(StoreError::invalid_filter(format!(
                                "unsupported operator: {other}"
                            )));
                        }
                    };
                    if !holds {
                        all = false;
                        break;
                    }
                }
                all
            }
            Bson::RegularExpression(regex) => regex_matches(&regex.pattern, value)?,
            expected => value == Some(expected),
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn is_operator_doc(document: &Document) -> bool {
    document.keys().next().is_some_and(|key| key.starts_with('$'))
}

fn regex_matches(pattern: &str, value: Option<&Bson>) -> StoreResult<bool> {
    let Some(Bson::String(text)) = value else {
        return Ok(false);
    };
    let regex = Regex::new(pattern)
        .map_err(|e| StoreError::invalid_filter(format!("bad pattern {pattern}: {e}")))?;
    Ok(regex.is_match(text))
}

/// Total order over the value types the engines sort and bound by.
///
/// Values of different types order by a fixed type rank, mirroring the
/// store's cross-type comparison just far enough for `_id` sorts and
/// timestamp bounds.
fn bson_cmp(a: &Bson, b: &Bson) -> Ordering {
    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => x.cmp(y),
        (Bson::Int64(x), Bson::Int64(y)) => x.cmp(y),
        (Bson::Int32(x), Bson::Int64(y)) => i64::from(*x).cmp(y),
        (Bson::Int64(x), Bson::Int32(y)) => x.cmp(&i64::from(*y)),
        (Bson::Double(x), Bson::Double(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Bson::Double(x), Bson::Int32(y)) => {
            x.partial_cmp(&f64::from(*y)).unwrap_or(Ordering::Equal)
        }
        (Bson::Int32(x), Bson::Double(y)) => {
            f64::from(*x).partial_cmp(y).unwrap_or(Ordering::Equal)
        }
        (Bson::Double(x), Bson::Int64(y)) => {
            x.partial_cmp(&(*y as f64)).unwrap_or(Ordering::Equal)
        }
        (Bson::Int64(x), Bson::Double(y)) => {
            (*x as f64).partial_cmp(y).unwrap_or(Ordering::Equal)
        }
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Timestamp(x), Bson::Timestamp(y)) => {
            (x.time, x.increment).cmp(&(y.time, y.increment))
        }
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::Null => 0,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => 1,
        Bson::String(_) => 2,
        Bson::Document(_) => 3,
        Bson::Array(_) => 4,
        Bson::Binary(_) => 5,
        Bson::ObjectId(_) => 6,
        Bson::Boolean(_) => 7,
        Bson::DateTime(_) => 8,
        Bson::Timestamp(_) => 9,
        _ => 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Timestamp;

    fn users(deployment: &MemoryDeployment) -> Arc<dyn CollectionHandle> {
        deployment.database("app").collection("users").unwrap()
    }

    #[test]
    fn insert_and_count() {
        let deployment = MemoryDeployment::new();
        let users = users(&deployment);
        users.insert(doc! { "_id": 1 }).unwrap();
        users.insert(doc! { "_id": 2 }).unwrap();
        assert_eq!(users.count().unwrap(), 2);
    }

    #[test]
    fn save_replaces_by_identity() {
        let deployment = MemoryDeployment::new();
        let users = users(&deployment);
        users.save(&doc! { "_id": 1, "name": "ada" }).unwrap();
        users.save(&doc! { "_id": 1, "name": "grace" }).unwrap();
        assert_eq!(users.count().unwrap(), 1);

        let found: Vec<_> = users
            .find(None, &FindOptions::new())
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(found[0].get_str("name").unwrap(), "grace");
    }

    #[test]
    fn remove_matches_all_fields() {
        let deployment = MemoryDeployment::new();
        let users = users(&deployment);
        users.insert(doc! { "_id": 1, "name": "ada" }).unwrap();
        users.insert(doc! { "_id": 2, "name": "ada" }).unwrap();

        let removed = users.remove(&doc! { "_id": 1, "name": "ada" }).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(users.count().unwrap(), 1);
    }

    #[test]
    fn find_sorts_by_id() {
        let deployment = MemoryDeployment::new();
        let users = users(&deployment);
        users.insert(doc! { "_id": 3 }).unwrap();
        users.insert(doc! { "_id": 1 }).unwrap();
        users.insert(doc! { "_id": 2 }).unwrap();

        let options = FindOptions::new().with_sort("_id", 1);
        let ids: Vec<i32> = users
            .find(None, &options)
            .unwrap()
            .map(|d| d.unwrap().get_i32("_id").unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn natural_descending_reverses_insertion_order() {
        let deployment = MemoryDeployment::new();
        let users = users(&deployment);
        users.insert(doc! { "_id": "first" }).unwrap();
        users.insert(doc! { "_id": "second" }).unwrap();

        let options = FindOptions::new().with_sort("$natural", -1);
        let ids: Vec<String> = users
            .find(None, &options)
            .unwrap()
            .map(|d| d.unwrap().get_str("_id").unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["second", "first"]);
    }

    #[test]
    fn gt_filter_on_timestamps() {
        let deployment = MemoryDeployment::new();
        let log = deployment.database("local").collection("oplog.rs").unwrap();
        for increment in 1..=4u32 {
            log.insert(doc! {
                "ts": Timestamp { time: 10, increment },
                "ns": "app.users",
                "op": "i",
            })
            .unwrap();
        }

        let filter = doc! { "ts": { "$gt": Timestamp { time: 10, increment: 2 } } };
        let found = log
            .find(Some(&filter), &FindOptions::new())
            .unwrap()
            .count();
        assert_eq!(found, 2);
    }

    #[test]
    fn regex_filter_on_namespace() {
        let deployment = MemoryDeployment::new();
        let log = deployment.database("local").collection("oplog.rs").unwrap();
        log.insert(doc! { "ns": "app.users", "op": "i" }).unwrap();
        log.insert(doc! { "ns": "other.users", "op": "i" }).unwrap();

        let filter = doc! { "ns": { "$regex": "^app\\." } };
        let found = log
            .find(Some(&filter), &FindOptions::new())
            .unwrap()
            .count();
        assert_eq!(found, 1);
    }

    #[test]
    fn unsupported_operator_is_rejected() {
        let deployment = MemoryDeployment::new();
        let users = users(&deployment);
        users.insert(doc! { "_id": 1 }).unwrap();

        let filter = doc! { "_id": { "$lt": 5 } };
        let err = users.find(Some(&filter), &FindOptions::new()).err().unwrap();
        assert!(matches!(err, StoreError::InvalidFilter(_)));
    }

    #[test]
    fn ismaster_reports_standalone_primary() {
        let deployment = MemoryDeployment::new();
        let reply = deployment
            .database("admin")
            .run_command(&doc! { "ismaster": 1 })
            .unwrap();
        assert!(reply.get_bool("ismaster").unwrap());
        assert!(reply.get_array("hosts").is_err());
    }

    #[test]
    fn ismaster_reports_replica_hosts() {
        let deployment =
            MemoryDeployment::replica_member(vec!["node0:27017".into(), "node1:27017".into()]);
        let reply = deployment
            .database("admin")
            .run_command(&doc! { "ismaster": 1 })
            .unwrap();
        assert_eq!(reply.get_array("hosts").unwrap().len(), 2);
    }

    #[test]
    fn apply_ops_inserts_updates_and_deletes() {
        let deployment = MemoryDeployment::new();
        let admin = deployment.database("admin");
        let users = users(&deployment);

        let entries = vec![
            Bson::Document(doc! {
                "ts": Timestamp { time: 1, increment: 1 },
                "ns": "app.users",
                "op": "i",
                "o": { "_id": 1, "name": "ada" },
            }),
            Bson::Document(doc! {
                "ts": Timestamp { time: 1, increment: 2 },
                "ns": "app.users",
                "op": "u",
                "o2": { "_id": 1 },
                "o": { "name": "grace" },
            }),
            Bson::Document(doc! {
                "ts": Timestamp { time: 1, increment: 3 },
                "ns": "app.users",
                "op": "i",
                "o": { "_id": 2, "name": "brian" },
            }),
            Bson::Document(doc! {
                "ts": Timestamp { time: 1, increment: 4 },
                "ns": "app.users",
                "op": "d",
                "o": { "_id": 2 },
            }),
        ];
        let reply = admin
            .run_command(&doc! { "applyOps": entries })
            .unwrap();
        assert_eq!(reply.get_i64("applied").unwrap(), 4);

        let docs: Vec<_> = users
            .find(None, &FindOptions::new())
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get_str("name").unwrap(), "grace");
    }

    #[test]
    fn apply_ops_is_idempotent() {
        let deployment = MemoryDeployment::new();
        let admin = deployment.database("admin");
        let entry = Bson::Document(doc! {
            "ts": Timestamp { time: 1, increment: 1 },
            "ns": "app.users",
            "op": "i",
            "o": { "_id": 1, "name": "ada" },
        });

        for _ in 0..2 {
            admin
                .run_command(&doc! { "applyOps": vec![entry.clone()] })
                .unwrap();
        }
        assert_eq!(users(&deployment).count().unwrap(), 1);
    }

    #[test]
    fn unknown_command_fails() {
        let deployment = MemoryDeployment::new();
        let err = deployment
            .database("admin")
            .run_command(&doc! { "shutdown": 1 })
            .unwrap_err();
        assert!(matches!(err, StoreError::CommandFailed { .. }));
    }

    #[test]
    fn drop_collection_removes_documents() {
        let deployment = MemoryDeployment::new();
        let db = deployment.database("app");
        db.collection("users")
            .unwrap()
            .insert(doc! { "_id": 1 })
            .unwrap();
        db.drop_collection("users").unwrap();
        assert!(db.collection_names().unwrap().is_empty());
    }
}
