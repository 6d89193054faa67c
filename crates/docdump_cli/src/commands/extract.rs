//! Extract command implementation.

use std::path::Path;

use docdump_core::{archive, layout};
use tracing::info;

/// Runs the extract command.
///
/// Expands `input` next to itself, like restore does before scanning, or
/// into `target` when one is given.
pub fn run(input: &Path, target: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    if !layout::is_archive(input) {
        return Err(format!("Not an archive: {}", input.display()).into());
    }

    let destination = match target {
        Some(target) => {
            archive::unzip_to(input, target)?;
            target.to_path_buf()
        }
        None => archive::materialize(input)?,
    };
    info!(destination = %destination.display(), "archive extracted");

    println!(
        "Extracted {} into {}",
        input.display(),
        destination.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docdump_testkit::fixtures::write_dump_unit;
    use std::fs;
    use tempfile::tempdir;

    fn archived_run(root: &Path) -> std::path::PathBuf {
        let run_dir = root.join("backup.2009-10-30-23-59");
        write_dump_unit(&run_dir, "users.bson", &[doc! { "_id": 1 }]);
        let archive_path = archive::zip_directory(&run_dir).unwrap();
        fs::remove_dir_all(&run_dir).unwrap();
        archive_path
    }

    #[test]
    fn extract_expands_next_to_the_archive() {
        let temp = tempdir().unwrap();
        let archive_path = archived_run(temp.path());

        run(&archive_path, None).unwrap();

        let expanded = temp.path().join("backup.2009-10-30-23-59");
        assert!(expanded.join("users.bson").exists());
    }

    #[test]
    fn extract_into_a_target_directory() {
        let temp = tempdir().unwrap();
        let archive_path = archived_run(temp.path());
        let target = temp.path().join("elsewhere");

        run(&archive_path, Some(&target)).unwrap();

        assert!(target.join("users.bson").exists());
    }

    #[test]
    fn non_archive_input_is_rejected() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("plain");
        fs::create_dir(&dir).unwrap();
        assert!(run(&dir, None).is_err());
    }
}
