//! Inspect command implementation.

use std::fs;
use std::path::Path;

use docdump_core::archive;
use docdump_core::restore::{DumpTree, RestoreUnit, UnitKind};
use docdump_core::RestoreFile;
use serde::Serialize;

/// Dump tree inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Inspected tree root (for archive input, the expanded directory).
    pub path: String,
    /// One entry per dump unit, regular units before replay units.
    pub units: Vec<UnitInfo>,
    /// Documents across all units.
    pub total_documents: u64,
    /// Bytes across all units.
    pub total_bytes: u64,
}

/// Statistics for a single dump unit.
#[derive(Debug, Serialize)]
pub struct UnitInfo {
    /// Collection the unit restores into.
    pub collection: String,
    /// Unit kind (`collection` or `replay`).
    pub kind: &'static str,
    /// Number of documents in the unit.
    pub documents: u64,
    /// File size in bytes.
    pub bytes: u64,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects the statistics of a dump tree. Archive input is expanded next
/// to itself first, exactly as restore would.
fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let root = archive::materialize(path)?;
    let tree = DumpTree::scan(&root)?;

    let mut units = Vec::new();
    let mut total_documents = 0;
    let mut total_bytes = 0;
    for unit in tree.regular().iter().chain(tree.replay().iter()) {
        let info = unit_info(unit)?;
        total_documents += info.documents;
        total_bytes += info.bytes;
        units.push(info);
    }

    Ok(InspectResult {
        path: root.display().to_string(),
        units,
        total_documents,
        total_bytes,
    })
}

fn unit_info(unit: &RestoreUnit) -> Result<UnitInfo, Box<dyn std::error::Error>> {
    let bytes = fs::metadata(unit.path())?.len();
    let mut documents = 0u64;
    for document in RestoreFile::open(unit.path())?.documents()? {
        document?;
        documents += 1;
    }
    Ok(UnitInfo {
        collection: unit.collection().to_string(),
        kind: kind_label(unit.kind()),
        documents,
        bytes,
    })
}

fn kind_label(kind: UnitKind) -> &'static str {
    match kind {
        UnitKind::Regular => "collection",
        UnitKind::Replay => "replay",
    }
}

fn print_text_output(result: &InspectResult) {
    println!("Dump Tree Inspection");
    println!("====================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Units:");
    for unit in &result.units {
        println!(
            "  [{:10}] {:32} {} documents, {}",
            unit.kind,
            unit.collection,
            unit.documents,
            format_size(unit.bytes)
        );
    }
    println!();
    println!("Totals:");
    println!("  Units:     {}", result.units.len());
    println!("  Documents: {}", result.total_documents);
    println!("  Size:      {}", format_size(result.total_bytes));
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docdump_testkit::fixtures::write_dump_unit;
    use tempfile::tempdir;

    #[test]
    fn inspect_counts_units_and_documents() {
        let temp = tempdir().unwrap();
        write_dump_unit(
            temp.path(),
            "users.bson",
            &[doc! { "_id": 1 }, doc! { "_id": 2 }],
        );
        write_dump_unit(
            temp.path(),
            "oplog.2009-10-30-23-59.bson",
            &[doc! { "op": "n" }],
        );

        let result = inspect(temp.path()).unwrap();

        assert_eq!(result.units.len(), 2);
        assert_eq!(result.total_documents, 3);
        assert!(result.total_bytes > 0);
        assert_eq!(result.units[0].collection, "users");
        assert_eq!(result.units[0].kind, "collection");
        assert_eq!(result.units[1].collection, "oplog.2009-10-30-23-59");
        assert_eq!(result.units[1].kind, "replay");
    }

    #[test]
    fn empty_tree_inspects_to_zero_totals() {
        let temp = tempdir().unwrap();
        let result = inspect(temp.path()).unwrap();
        assert!(result.units.is_empty());
        assert_eq!(result.total_documents, 0);
        assert_eq!(result.total_bytes, 0);
    }

    #[test]
    fn undecodable_unit_fails_inspection() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("bad.bson"), [1u8, 0, 0]).unwrap();
        assert!(inspect(temp.path()).is_err());
    }
}
