//! # docdump Core
//!
//! Backup and restore engines for document databases.
//!
//! This crate provides:
//! - Full dumps: every collection of a database snapshotted to one
//!   timestamped run directory by a bounded worker pool
//! - Replication-log capture alongside a full dump, anchored before the
//!   first collection read so point-in-time recovery loses nothing
//! - Incremental dumps: the log slice since the persisted checkpoint
//! - Restore: idempotent upsert-by-identity application of a dump tree or
//!   its archive, followed by ordered log replay
//! - Archival: a finished run compressed into a single `.zip`
//!
//! ## Design Principles
//!
//! - Engines talk to the database only through the `docdump_store` traits
//! - Regular collections dump in identity order; log entries keep log order
//! - Restore converges when re-run; failures leave resumable state behind
//!
//! ## Example
//!
//! ```rust
//! use bson::doc;
//! use docdump_core::{FullDump, Restore};
//! use docdump_store::{DatabaseRegistry, MemoryDeployment};
//!
//! # fn main() -> docdump_core::CoreResult<()> {
//! let source = MemoryDeployment::new();
//! let registry = DatabaseRegistry::builder()
//!     .database(source.database("admin"))
//!     .database(source.database("local"))
//!     .database(source.database("app"))
//!     .build();
//! registry
//!     .get("app")?
//!     .collection("users")?
//!     .save(&doc! { "_id": 1, "name": "ada" })?;
//!
//! let out = tempfile::tempdir()?;
//! let report = FullDump::with_defaults(registry).run(out.path(), "app", "backup", 2)?;
//! assert_eq!(report.documents, 1);
//!
//! let target = MemoryDeployment::new();
//! let target_registry = DatabaseRegistry::builder()
//!     .database(target.database("admin"))
//!     .database(target.database("local"))
//!     .database(target.database("app"))
//!     .build();
//! Restore::with_defaults(target_registry.clone()).run(&report.output_dir, "app")?;
//! assert_eq!(target_registry.get("app")?.collection("users")?.count()?, 1);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Version of the engine crate, as compiled.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod archive;
mod checkpoint;
mod dump;
mod error;
mod incremental;
pub mod layout;
pub mod oplog;
mod pool;
pub mod restore;
mod task;
mod types;
mod writer;

pub use checkpoint::{CheckpointFile, CHECKPOINT_FILE};
pub use dump::{DumpOptions, DumpReport, FullDump};
pub use error::{CoreError, CoreResult};
pub use incremental::{IncrementalDump, IncrementalReport};
pub use pool::{CancelToken, WorkerPool};
pub use restore::{Restore, RestoreFile, RestoreOptions, RestoreReport};
pub use task::CollectionDumpSpec;
pub use types::{LogPosition, ParsePositionError};
pub use writer::{BsonDumpWriter, DumpWriter};
