//! Verify command implementation.

use std::path::Path;

use docdump_core::archive;
use docdump_core::oplog;
use docdump_core::restore::{DumpTree, RestoreUnit, UnitKind};
use docdump_core::{LogPosition, RestoreFile};
use serde::Serialize;
use tracing::debug;

/// Verification result for one dump tree.
#[derive(Debug, Serialize)]
pub struct VerifyResult {
    /// Number of units checked.
    pub units_checked: usize,
    /// Number of units that decoded cleanly, in capture order where that
    /// applies.
    pub valid_units: usize,
    /// Number of units with decode or ordering problems.
    pub corrupt_units: usize,
    /// Documents decoded across all units.
    pub documents_checked: u64,
    /// List of problems found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn new() -> Self {
        Self {
            units_checked: 0,
            valid_units: 0,
            corrupt_units: 0,
            documents_checked: 0,
            errors: Vec::new(),
        }
    }

    fn is_ok(&self) -> bool {
        self.corrupt_units == 0 && self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = verify(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    if result.is_ok() {
        Ok(())
    } else {
        Err("Verification failed".into())
    }
}

fn verify(path: &Path) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let root = archive::materialize(path)?;
    let tree = DumpTree::scan(&root)?;

    let mut result = VerifyResult::new();
    for unit in tree.regular().iter().chain(tree.replay().iter()) {
        result.units_checked += 1;
        match check_unit(unit) {
            Ok((documents, unit_errors)) => {
                result.documents_checked += documents;
                if unit_errors.is_empty() {
                    result.valid_units += 1;
                } else {
                    result.corrupt_units += 1;
                    result.errors.extend(unit_errors);
                }
            }
            Err(error) => {
                result.corrupt_units += 1;
                result
                    .errors
                    .push(format!("{}: {}", unit.collection(), error));
            }
        }
    }

    Ok(result)
}

/// Decodes one unit in full. Replay units must additionally carry
/// non-decreasing positions; anything else would replay out of order.
fn check_unit(unit: &RestoreUnit) -> Result<(u64, Vec<String>), Box<dyn std::error::Error>> {
    debug!(collection = unit.collection(), "verifying unit");
    let mut documents = 0u64;
    let mut errors = Vec::new();
    let mut last: Option<LogPosition> = None;

    for item in RestoreFile::open(unit.path())?.documents()? {
        let document = match item {
            Ok(document) => document,
            Err(error) => {
                errors.push(format!(
                    "{}: decode failed after {} documents: {}",
                    unit.collection(),
                    documents,
                    error
                ));
                break;
            }
        };
        documents += 1;

        if unit.kind() == UnitKind::Replay {
            match oplog::entry_position(&document) {
                Ok(position) => {
                    if last.is_some_and(|previous| position < previous) {
                        errors.push(format!(
                            "{}: entry {} is out of capture order",
                            unit.collection(),
                            position
                        ));
                    }
                    last = Some(position);
                }
                Err(error) => {
                    errors.push(format!("{}: {}", unit.collection(), error));
                }
            }
        }
    }

    Ok((documents, errors))
}

fn print_text_output(result: &VerifyResult) {
    println!(
        "Units checked: {}, valid: {}, corrupt: {}",
        result.units_checked, result.valid_units, result.corrupt_units
    );
    println!("Documents decoded: {}", result.documents_checked);
    for error in &result.errors {
        println!("  ERROR: {}", error);
    }
    println!();
    if result.is_ok() {
        println!("✓ Dump tree verification passed");
    } else {
        println!("✗ Dump tree verification failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docdump_testkit::fixtures::{insert_entry, write_dump_unit};
    use tempfile::tempdir;

    #[test]
    fn clean_tree_verifies() {
        let temp = tempdir().unwrap();
        write_dump_unit(
            temp.path(),
            "users.bson",
            &[doc! { "_id": 1 }, doc! { "_id": 2 }],
        );
        write_dump_unit(
            temp.path(),
            "oplog.2009-10-30-23-59.bson",
            &[
                insert_entry(10, 1, "app.users", doc! { "_id": 1 }),
                insert_entry(10, 2, "app.users", doc! { "_id": 2 }),
            ],
        );

        let result = verify(temp.path()).unwrap();

        assert!(result.is_ok());
        assert_eq!(result.units_checked, 2);
        assert_eq!(result.valid_units, 2);
        assert_eq!(result.documents_checked, 4);
    }

    #[test]
    fn out_of_order_replay_entries_are_reported() {
        let temp = tempdir().unwrap();
        write_dump_unit(
            temp.path(),
            "oplog.2009-10-30-23-59.bson",
            &[
                insert_entry(11, 0, "app.users", doc! { "_id": 1 }),
                insert_entry(10, 0, "app.users", doc! { "_id": 2 }),
            ],
        );

        let result = verify(temp.path()).unwrap();

        assert!(!result.is_ok());
        assert_eq!(result.corrupt_units, 1);
        assert!(result.errors[0].contains("out of capture order"));
    }

    #[test]
    fn entries_without_a_position_are_reported() {
        let temp = tempdir().unwrap();
        write_dump_unit(
            temp.path(),
            "oplog.2009-10-30-23-59.bson",
            &[doc! { "op": "i", "ns": "app.users" }],
        );

        let result = verify(temp.path()).unwrap();

        assert!(!result.is_ok());
        assert_eq!(result.corrupt_units, 1);
    }

    #[test]
    fn truncated_unit_does_not_stop_the_other_checks() {
        let temp = tempdir().unwrap();
        write_dump_unit(temp.path(), "users.bson", &[doc! { "_id": 1 }]);
        let mut bytes = Vec::new();
        doc! { "_id": 2, "name": "bob" }
            .to_writer(&mut bytes)
            .unwrap();
        bytes.truncate(bytes.len() - 3);
        std::fs::write(temp.path().join("cut.bson"), &bytes).unwrap();

        let result = verify(temp.path()).unwrap();

        assert_eq!(result.units_checked, 2);
        assert_eq!(result.valid_units, 1);
        assert_eq!(result.corrupt_units, 1);
        assert!(result.errors[0].contains("decode failed"));
    }
}
