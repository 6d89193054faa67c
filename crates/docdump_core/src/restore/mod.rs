//! Restore of dump trees into a live database.
//!
//! A restore input is either a plain dump tree or its archive form. The run
//! is three separable steps:
//!
//! 1. Materialize a plain directory ([`crate::archive::materialize`]).
//! 2. Enumerate and classify its dump files ([`DumpTree`]).
//! 3. Apply the units in order ([`Restore`]): regular collections by
//!    upsert-by-identity, then captured log entries by replay.
//!
//! Application order is fixed: every regular-collection write is visible
//! before the first replay command executes, and replay units apply oldest
//! capture first so operations re-run in the order they originally
//! happened.
//!
//! Two collection families get special treatment, by name:
//!
//! - `system.`-prefixed collections are never dropped, even when the run
//!   asks for drop-first.
//! - the user-authentication collection is merged rather than overlaid:
//!   destination documents missing from the dump are removed, so stale
//!   credentials do not survive a restore.

mod engine;
mod file;
mod scan;

pub use engine::{Restore, RestoreOptions, RestoreReport};
pub use file::{Documents, RestoreFile};
pub use scan::{DumpTree, RestoreUnit, UnitKind};
