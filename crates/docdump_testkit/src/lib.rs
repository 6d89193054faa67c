//! # docdump Testkit
//!
//! Test utilities for docdump.
//!
//! This crate provides:
//! - Deployment fixtures covering the node roles the engines distinguish
//! - Dump-tree builders and readers for on-disk assertions
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use bson::doc;
//! use docdump_testkit::prelude::*;
//!
//! let fixture = TestDeployment::standalone(&["app"]);
//! fixture.seed("app", "users", &[doc! { "_id": 1, "name": "ada" }]);
//! assert_eq!(fixture.documents("app", "users").len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
