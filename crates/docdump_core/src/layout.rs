//! Dump tree naming and layout conventions.
//!
//! Every run of the engines produces files under a single output root:
//!
//! ```text
//! <output_root>/
//! ├─ <dump_name>.<timestamp>/            # full dump run directory
//! │  ├─ <collection>.bson                # one file per collection
//! │  └─ oplog.<timestamp>.bson           # log capture for the run
//! ├─ <dump_name>.<timestamp>.zip         # archive form of a run
//! ├─ oplog.<timestamp>.bson              # incremental capture
//! └─ incremental_last_timestamp.txt      # incremental checkpoint
//! ```
//!
//! Timestamps are GMT, minute resolution, fixed width, so lexical order of
//! file names equals capture order. All predicates here operate on names,
//! never on file contents.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Extension of dump files (without the dot).
pub const DUMP_EXTENSION: &str = "bson";
/// Extension of archived runs (without the dot).
pub const ARCHIVE_EXTENSION: &str = "zip";
/// Name prefix identifying replication-log capture files.
pub const OPLOG: &str = "oplog";
/// Prefix of collections the engines never drop.
pub const SYSTEM_PREFIX: &str = "system.";
/// Suffix of user-authentication collections, which restore merges instead
/// of overwriting.
pub const USER_SUFFIX: &str = "system.user";
/// Field holding an entry's position in the replication log.
pub const TIMESTAMP_FIELD: &str = "ts";
/// Field holding an entry's namespace (`database.collection`).
pub const NAMESPACE_FIELD: &str = "ns";
/// Document identity field.
pub const ID_FIELD: &str = "_id";
/// Pseudo-field selecting the store's insertion order.
pub const NATURAL_ORDER: &str = "$natural";

/// Format of the capture-timestamp suffix appended to dump names.
const TIMESTAMP_FORMAT: &str = ".%Y-%m-%d-%H-%M";

/// Returns the path of a dump file: `root/target.extension`.
#[must_use]
pub fn dump_file_path(root: &Path, target: &str, extension: &str) -> PathBuf {
    root.join(format!("{target}.{extension}"))
}

/// Returns true if the path names a dump file.
#[must_use]
pub fn is_dump_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == DUMP_EXTENSION)
}

/// Returns true if the path names an archived run.
#[must_use]
pub fn is_archive(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == ARCHIVE_EXTENSION)
}

/// Derives the collection name from a dump file name by stripping the last
/// extension. Returns `None` for names without one.
#[must_use]
pub fn collection_name(file_name: &str) -> Option<&str> {
    let dot = file_name.rfind('.')?;
    if dot == 0 {
        return None;
    }
    Some(&file_name[..dot])
}

/// Returns true for collections under the protected `system.` prefix.
#[must_use]
pub fn is_system_collection(name: &str) -> bool {
    name.starts_with(SYSTEM_PREFIX)
}

/// Returns true for user-authentication collections.
#[must_use]
pub fn is_user_collection(name: &str) -> bool {
    name.ends_with(USER_SUFFIX)
}

/// Returns true for replication-log capture names.
#[must_use]
pub fn is_oplog_name(name: &str) -> bool {
    name.starts_with(OPLOG)
}

/// Returns the anchored pattern matching every namespace of `database`.
#[must_use]
pub fn namespace_pattern(database: &str) -> String {
    format!("^{}\\.", regex::escape(database))
}

/// Returns the anchored pattern matching every namespace of any of
/// `databases`.
#[must_use]
pub fn multi_namespace_pattern(databases: &[String]) -> String {
    let alternatives: Vec<String> = databases.iter().map(|db| regex::escape(db)).collect();
    format!("^(?:{})\\.", alternatives.join("|"))
}

/// Formats the capture-timestamp suffix for `time`, GMT, minute resolution.
#[must_use]
pub fn timestamp_suffix(time: DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Appends the capture timestamp to a dump name.
#[must_use]
pub fn timestamped(name: &str, time: DateTime<Utc>) -> String {
    format!("{name}{}", timestamp_suffix(time))
}

/// Returns the target name of a log capture taken at `time`.
#[must_use]
pub fn oplog_target(time: DateTime<Utc>) -> String {
    timestamped(OPLOG, time)
}
