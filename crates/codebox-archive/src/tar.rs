//! Gzip-compressed tar codec with strict path safety.
//!
//! Extraction materializes caller-supplied archive bytes into a scratch
//! workspace; every entry name is validated before anything touches the
//! filesystem, and only directories and regular files are accepted.
//! Creation walks a workspace in deterministic order and streams a
//! tar.gz, consulting [`crate::is_excluded`] per entry. The byte format
//! stays compatible with standard archive tooling.

use crate::is_excluded;
use codebox_core::{Error, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};
use tar::EntryType;
use walkdir::WalkDir;

/// Extracts a gzip-compressed tar archive into `dest`.
///
/// Every entry is validated before it is applied:
///
/// - names with parent-directory segments, root or prefix components,
///   or a joined path escaping `dest` fail with
///   [`Error::UnsafeArchivePath`];
/// - entry types other than directories and regular files (symlinks,
///   devices, ...) fail with [`Error::UnsupportedArchiveEntry`].
///
/// Validation failures abort the whole operation at the first bad entry.
/// Entries written before the failure may remain on disk; callers extract
/// into a scratch workspace whose cleanup covers that. Declared entry
/// sizes only bound the copy - nothing is preallocated from them.
///
/// An empty `archive` is a no-op.
///
/// # Errors
///
/// Returns [`Error::InvalidArchive`] for undecodable bytes, the
/// path-safety errors above, or [`Error::Io`] for filesystem failures.
pub fn extract(archive: &[u8], dest: &Path) -> Result<()> {
    if archive.is_empty() {
        return Ok(());
    }

    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    let entries = tar.entries().map_err(|e| Error::InvalidArchive {
        message: format!("failed to read archive: {e}"),
    })?;

    for entry in entries {
        let mut entry = entry.map_err(|e| Error::InvalidArchive {
            message: format!("failed to read archive entry: {e}"),
        })?;
        let raw_name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let target = safe_join(dest, &raw_name)?;

        match entry.header().entry_type() {
            EntryType::Directory => {
                std::fs::create_dir_all(&target)
                    .map_err(|e| Error::io(format!("failed to create {raw_name}"), e))?;
            }
            EntryType::Regular => {
                if target == dest {
                    return Err(Error::UnsafeArchivePath { name: raw_name });
                }
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        Error::io(format!("failed to create parent of {raw_name}"), e)
                    })?;
                }
                let mut file = File::create(&target)
                    .map_err(|e| Error::io(format!("failed to create {raw_name}"), e))?;
                // The Entry reader is bounded by the header size, so the
                // copy cannot overrun the declared length.
                io::copy(&mut entry, &mut file)
                    .map_err(|e| Error::io(format!("failed to write {raw_name}"), e))?;
            }
            other => {
                return Err(Error::UnsupportedArchiveEntry {
                    name: raw_name,
                    kind: entry_kind(other).to_string(),
                });
            }
        }
    }

    Ok(())
}

/// Packages a directory tree as a gzip-compressed tar archive.
///
/// The walk visits entries in sorted order, so identical trees produce
/// identical entry sequences. A directory matching an exclusion pattern
/// is pruned without descending; a matching file is skipped. Entry names
/// are paths relative to `src`. The tar stream is compressed as it is
/// produced.
///
/// An empty directory yields a minimal valid archive.
///
/// # Errors
///
/// Returns [`Error::Io`] when the walk or archive writing fails.
pub fn create(src: &Path, exclude_patterns: &[String]) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut walker = WalkDir::new(src)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| Error::io("failed to walk workspace", e.into()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| {
                Error::io(
                    "walked entry outside workspace root",
                    io::Error::new(io::ErrorKind::InvalidData, e),
                )
            })?
            .to_string_lossy()
            .into_owned();

        if is_excluded(&rel, exclude_patterns) {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }

        if entry.file_type().is_dir() {
            builder
                .append_dir(&rel, entry.path())
                .map_err(|e| Error::io(format!("failed to archive directory {rel}"), e))?;
        } else if entry.file_type().is_file() {
            let mut file = File::open(entry.path())
                .map_err(|e| Error::io(format!("failed to open {rel}"), e))?;
            builder
                .append_file(&rel, &mut file)
                .map_err(|e| Error::io(format!("failed to archive {rel}"), e))?;
        } else {
            // Symlinks and other special files never leave the workspace.
            tracing::debug!(path = %rel, "skipping special file in workspace");
        }
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| Error::io("failed to finish archive", e))?;
    encoder
        .finish()
        .map_err(|e| Error::io("failed to finish compression", e))
}

/// Joins an entry name onto `dest`, rejecting every escape form.
fn safe_join(dest: &Path, raw_name: &str) -> Result<PathBuf> {
    let mut target = dest.to_path_buf();
    for component in Path::new(raw_name).components() {
        match component {
            Component::Normal(part) => target.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::UnsafeArchivePath {
                    name: raw_name.to_string(),
                });
            }
        }
    }
    // Belt and braces: the join above cannot leave dest once parent and
    // root components are rejected, but verify anyway.
    if !target.starts_with(dest) {
        return Err(Error::UnsafeArchivePath {
            name: raw_name.to_string(),
        });
    }
    Ok(target)
}

const fn entry_kind(entry_type: EntryType) -> &'static str {
    match entry_type {
        EntryType::Symlink => "symlink",
        EntryType::Link => "hard link",
        EntryType::Char => "character device",
        EntryType::Block => "block device",
        EntryType::Fifo => "fifo",
        _ => "unsupported",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = File::create(path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    fn read_file(root: &Path, rel: &str) -> String {
        std::fs::read_to_string(root.join(rel)).unwrap()
    }

    #[test]
    fn round_trip_preserves_contents() {
        let src = tempfile::tempdir().unwrap();
        write_file(src.path(), "main.py", "print('hi')\n");
        write_file(src.path(), "data/input.txt", "1 2 3\n");
        write_file(src.path(), "data/nested/deep.txt", "deep\n");

        let archive = create(src.path(), &[]).unwrap();
        assert!(!archive.is_empty());

        let dest = tempfile::tempdir().unwrap();
        extract(&archive, dest.path()).unwrap();

        assert_eq!(read_file(dest.path(), "main.py"), "print('hi')\n");
        assert_eq!(read_file(dest.path(), "data/input.txt"), "1 2 3\n");
        assert_eq!(read_file(dest.path(), "data/nested/deep.txt"), "deep\n");
    }

    #[test]
    fn create_is_deterministic() {
        let src = tempfile::tempdir().unwrap();
        write_file(src.path(), "b.txt", "b");
        write_file(src.path(), "a.txt", "a");
        write_file(src.path(), "c/d.txt", "d");

        let names = |archive: &[u8]| -> Vec<String> {
            let mut tar = tar::Archive::new(GzDecoder::new(archive));
            tar.entries()
                .unwrap()
                .map(|e| {
                    String::from_utf8_lossy(&e.unwrap().path_bytes()).into_owned()
                })
                .collect()
        };

        let first = names(&create(src.path(), &[]).unwrap());
        let second = names(&create(src.path(), &[]).unwrap());
        assert_eq!(first, second);
        assert_eq!(first, vec!["a.txt", "b.txt", "c", "c/d.txt"]);
    }

    #[test]
    fn create_applies_exclusions() {
        let src = tempfile::tempdir().unwrap();
        write_file(src.path(), "main.py", "code");
        write_file(src.path(), "cache.pyc", "junk");
        write_file(src.path(), "__pycache__/mod.cpython-311.pyc", "junk");
        write_file(src.path(), "sub/__pycache__/other.pyc", "junk");

        let patterns = vec!["__pycache__/".to_string(), "*.pyc".to_string()];
        let archive = create(src.path(), &patterns).unwrap();

        let dest = tempfile::tempdir().unwrap();
        extract(&archive, dest.path()).unwrap();

        assert!(dest.path().join("main.py").exists());
        assert!(!dest.path().join("cache.pyc").exists());
        assert!(!dest.path().join("__pycache__").exists());
        assert!(!dest.path().join("sub/__pycache__").exists());
    }

    #[test]
    fn extract_empty_archive_is_noop() {
        let dest = tempfile::tempdir().unwrap();
        extract(&[], dest.path()).unwrap();
        assert_eq!(std::fs::read_dir(dest.path()).unwrap().count(), 0);
    }

    #[test]
    fn create_empty_dir_yields_valid_archive() {
        let src = tempfile::tempdir().unwrap();
        let archive = create(src.path(), &[]).unwrap();

        let dest = tempfile::tempdir().unwrap();
        extract(&archive, dest.path()).unwrap();
        assert_eq!(std::fs::read_dir(dest.path()).unwrap().count(), 0);
    }

    #[test]
    fn extract_rejects_garbage_bytes() {
        let dest = tempfile::tempdir().unwrap();
        let err = extract(b"definitely not a tarball", dest.path()).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn safe_join_rejects_escapes() {
        let dest = Path::new("/scratch/ws");
        assert!(safe_join(dest, "../evil.txt").is_err());
        assert!(safe_join(dest, "a/../../evil.txt").is_err());
        assert!(safe_join(dest, "/etc/passwd").is_err());
        assert_eq!(
            safe_join(dest, "./a/b.txt").unwrap(),
            Path::new("/scratch/ws/a/b.txt")
        );
        // Dots inside a file name are not traversal.
        assert_eq!(
            safe_join(dest, "a..b.txt").unwrap(),
            Path::new("/scratch/ws/a..b.txt")
        );
    }
}
