//! CLI command implementations.

pub mod archive;
pub mod checkpoint;
pub mod extract;
pub mod inspect;
pub mod verify;
