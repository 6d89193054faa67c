//! Replication log location and capture queries.
//!
//! The replication log lives in the node-local database under a name that
//! depends on the node's role: replica-set members expose `oplog.rs`, a
//! standalone master exposes `oplog.$main`, and any other role has no log
//! to capture from. [`OplogLocator`] resolves the collection by asking the
//! administrative database for the node's role.
//!
//! This module also owns the capture query shape shared by the full and
//! incremental engines: a namespace pattern restricting entries to the
//! dumped databases, plus an optional strictly-greater position bound.

use std::sync::Arc;

use bson::{doc, Bson, Document, Timestamp};
use docdump_store::{CollectionHandle, DatabaseRegistry, FindOptions};

use crate::error::{CoreError, CoreResult};
use crate::layout;
use crate::types::LogPosition;

/// Log collection name on a replica-set member.
pub const REPLICA_SET_LOG: &str = "oplog.rs";
/// Log collection name on a standalone master.
pub const MASTER_LOG: &str = "oplog.$main";

/// Resolves the replication log collection for a deployment.
#[derive(Debug, Clone)]
pub struct OplogLocator {
    registry: DatabaseRegistry,
}

impl OplogLocator {
    /// Creates a locator over `registry`.
    #[must_use]
    pub fn new(registry: DatabaseRegistry) -> Self {
        Self { registry }
    }

    /// Returns the log collection for the node's role.
    ///
    /// A node advertising replica-set hosts uses [`REPLICA_SET_LOG`]; a
    /// standalone node must be master and uses [`MASTER_LOG`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedNodeRole`] for a standalone
    /// non-master node, and a store error if the role cannot be queried.
    pub fn locate(&self) -> CoreResult<Arc<dyn CollectionHandle>> {
        let admin = self.registry.admin()?;
        let reply = admin.run_command(&doc! { "ismaster": 1 })?;

        let name = if reply.contains_key("hosts") {
            REPLICA_SET_LOG
        } else if reply.get_bool("ismaster").unwrap_or(false) {
            MASTER_LOG
        } else {
            return Err(CoreError::UnsupportedNodeRole);
        };

        let local = self.registry.local()?;
        Ok(local.collection(name)?)
    }
}

/// Builds the capture query for namespaces matching `pattern`, optionally
/// bounded below (strictly) by `after`.
#[must_use]
pub fn capture_query(pattern: &str, after: Option<LogPosition>) -> Document {
    let mut query = doc! {
        layout::NAMESPACE_FIELD: Bson::RegularExpression(bson::Regex {
            pattern: pattern.to_string(),
            options: String::new(),
        }),
    };
    if let Some(position) = after {
        query.insert(
            layout::TIMESTAMP_FIELD,
            doc! { "$gt": Timestamp::from(position) },
        );
    }
    query
}

/// Extracts an entry's position from its `ts` field.
///
/// # Errors
///
/// Returns [`CoreError::MalformedLogEntry`] if the field is missing or has
/// the wrong type.
pub fn entry_position(entry: &Document) -> CoreResult<LogPosition> {
    let ts = entry
        .get_timestamp(layout::TIMESTAMP_FIELD)
        .map_err(|_| CoreError::malformed_log_entry("entry has no ts field"))?;
    Ok(LogPosition::from(ts))
}

/// Returns the position of the newest log entry matching `pattern`, or
/// `None` when no entry matches.
///
/// The probe reads in reverse insertion order, so the first match is the
/// current tail of the relevant slice of the log.
///
/// # Errors
///
/// Returns an error if the log cannot be read or the tail entry is
/// malformed.
pub fn latest_position(
    log: &Arc<dyn CollectionHandle>,
    pattern: &str,
) -> CoreResult<Option<LogPosition>> {
    let filter = capture_query(pattern, None);
    let options = FindOptions::new().with_sort(layout::NATURAL_ORDER, -1);
    let mut cursor = log.find(Some(&filter), &options)?;
    match cursor.next() {
        None => Ok(None),
        Some(entry) => {
            let entry = entry?;
            Ok(Some(entry_position(&entry)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docdump_store::MemoryDeployment;

    fn registry_for(deployment: &MemoryDeployment) -> DatabaseRegistry {
        DatabaseRegistry::builder()
            .database(deployment.database("admin"))
            .database(deployment.database("local"))
            .database(deployment.database("app"))
            .build()
    }

    fn log_entry(time: u32, increment: u32, ns: &str) -> Document {
        doc! {
            "ts": Timestamp { time, increment },
            "ns": ns,
            "op": "i",
            "o": { "_id": increment as i32 },
        }
    }

    #[test]
    fn replica_member_uses_replica_set_log() {
        let deployment = MemoryDeployment::replica_member(vec!["node0:27017".into()]);
        let locator = OplogLocator::new(registry_for(&deployment));
        assert_eq!(locator.locate().unwrap().name(), REPLICA_SET_LOG);
    }

    #[test]
    fn standalone_master_uses_main_log() {
        let deployment = MemoryDeployment::new();
        let locator = OplogLocator::new(registry_for(&deployment));
        assert_eq!(locator.locate().unwrap().name(), MASTER_LOG);
    }

    #[test]
    fn standalone_secondary_is_unsupported() {
        let deployment = MemoryDeployment::secondary();
        let locator = OplogLocator::new(registry_for(&deployment));
        let err = locator.locate().err().unwrap();
        assert!(matches!(err, CoreError::UnsupportedNodeRole));
    }

    #[test]
    fn capture_query_bounds_are_strictly_greater() {
        let query = capture_query("^app\\.", Some(LogPosition::new(10, 3)));
        let bound = query.get_document("ts").unwrap();
        assert_eq!(
            bound.get("$gt"),
            Some(&Bson::Timestamp(Timestamp { time: 10, increment: 3 }))
        );
    }

    #[test]
    fn capture_query_without_bound_filters_namespace_only() {
        let query = capture_query("^app\\.", None);
        assert!(query.get("ts").is_none());
        assert!(matches!(
            query.get("ns"),
            Some(Bson::RegularExpression(_))
        ));
    }

    #[test]
    fn latest_position_reads_the_matching_tail() {
        let deployment = MemoryDeployment::new();
        let log = deployment
            .database("local")
            .collection(MASTER_LOG)
            .unwrap();
        log.insert(log_entry(10, 1, "app.users")).unwrap();
        log.insert(log_entry(10, 2, "app.users")).unwrap();
        log.insert(log_entry(11, 1, "other.users")).unwrap();

        let position = latest_position(&log, &layout::namespace_pattern("app")).unwrap();
        assert_eq!(position, Some(LogPosition::new(10, 2)));
    }

    #[test]
    fn latest_position_on_empty_log_is_none() {
        let deployment = MemoryDeployment::new();
        let log = deployment
            .database("local")
            .collection(MASTER_LOG)
            .unwrap();
        assert_eq!(
            latest_position(&log, &layout::namespace_pattern("app")).unwrap(),
            None
        );
    }
}
