//! # docdump Store
//!
//! Database boundary traits and the in-memory deployment for docdump.
//!
//! This crate defines the narrow surface the backup engines need from a
//! document database: named databases, collections with cursors and
//! identity-upsert writes, and a handful of administrative commands. The
//! engines never talk to a driver directly; they resolve handles through an
//! immutable [`DatabaseRegistry`] built once per run.
//!
//! ## Design Principles
//!
//! - Handles are trait objects, `Send + Sync`, shareable across workers
//! - The registry is immutable after construction; no shared mutable maps
//! - Cursors are plain iterators; errors surface per item, mid-stream
//!
//! ## Available Deployments
//!
//! - [`MemoryDeployment`] - in-memory double covering exactly the query and
//!   command surface the engines use
//!
//! ## Example
//!
//! ```rust
//! use bson::doc;
//! use docdump_store::{DatabaseRegistry, MemoryDeployment};
//!
//! let deployment = MemoryDeployment::new();
//! let registry = DatabaseRegistry::builder()
//!     .database(deployment.database("app"))
//!     .database(deployment.database("admin"))
//!     .database(deployment.database("local"))
//!     .build();
//!
//! let users = registry.get("app").unwrap().collection("users").unwrap();
//! users.save(&doc! { "_id": 1, "name": "ada" }).unwrap();
//! assert_eq!(users.count().unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod handle;
mod memory;
mod registry;

pub use error::{StoreError, StoreResult};
pub use handle::{CollectionHandle, DatabaseHandle, DocumentCursor, FindOptions};
pub use memory::{MemoryCollection, MemoryDatabase, MemoryDeployment};
pub use registry::{DatabaseRegistry, RegistryBuilder, ADMIN_DB, LOCAL_DB};
