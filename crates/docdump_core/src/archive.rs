//! Archival of dump run directories.
//!
//! A completed run directory can be compressed into a sibling `.zip` whose
//! entries keep their paths relative to the run directory, so expanding the
//! archive reproduces the tree byte for byte. Restore accepts either form;
//! [`materialize`] turns whichever it gets into a plain directory.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{CoreError, CoreResult};
use crate::layout;

/// Returns the archive path for a run directory: the directory path with
/// `.zip` appended.
#[must_use]
pub fn archive_path_for(dir: &Path) -> PathBuf {
    let mut path = dir.as_os_str().to_os_string();
    path.push(".");
    path.push(layout::ARCHIVE_EXTENSION);
    PathBuf::from(path)
}

/// Compresses `dir` into its sibling archive and returns the archive path.
///
/// Entry names are relative to `dir`. The directory itself is left in
/// place; callers decide whether to remove it afterwards.
///
/// # Errors
///
/// Returns an error if `dir` cannot be walked or the archive cannot be
/// written.
pub fn zip_directory(dir: &Path) -> CoreResult<PathBuf> {
    let archive_path = archive_path_for(dir);
    let file = File::create(&archive_path)?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|_| CoreError::invalid_dump("walked entry outside the run directory"))?;
        let name = entry_name(relative);
        if entry.file_type().is_dir() {
            writer.add_directory(name, options)?;
        } else {
            writer.start_file(name, options)?;
            let mut source = File::open(entry.path())?;
            io::copy(&mut source, &mut writer)?;
        }
    }

    writer.finish()?;
    Ok(archive_path)
}

/// Expands `archive` into `dest`, creating it as needed.
///
/// # Errors
///
/// Returns an error if the archive is unreadable or contains an entry whose
/// name escapes `dest`.
pub fn unzip_to(archive: &Path, dest: &Path) -> CoreResult<()> {
    let file = File::open(archive)?;
    let mut reader = ZipArchive::new(file)?;

    for index in 0..reader.len() {
        let mut entry = reader.by_index(index)?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(CoreError::invalid_dump(format!(
                "archive entry escapes the output directory: {}",
                entry.name()
            )));
        };
        let target = dest.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)?;
        }
    }
    Ok(())
}

/// Turns a restore input into a plain directory.
///
/// Directories pass through unchanged. An archive is expanded into the
/// sibling directory named by stripping its extension, which is then
/// returned.
///
/// # Errors
///
/// Returns [`CoreError::InvalidDump`] if the input is neither a directory
/// nor an archive, or an archive error if expansion fails.
pub fn materialize(input: &Path) -> CoreResult<PathBuf> {
    if input.is_dir() {
        return Ok(input.to_path_buf());
    }
    if !layout::is_archive(input) {
        return Err(CoreError::invalid_dump(format!(
            "not a dump directory or archive: {}",
            input.display()
        )));
    }
    let file_name = input
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| CoreError::invalid_dump("archive has no usable file name"))?;
    let dir_name = layout::collection_name(file_name)
        .ok_or_else(|| CoreError::invalid_dump("archive name has no extension to strip"))?;
    let dest = match input.parent() {
        Some(parent) => parent.join(dir_name),
        None => PathBuf::from(dir_name),
    };
    unzip_to(input, &dest)?;
    Ok(dest)
}

fn entry_name(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}
