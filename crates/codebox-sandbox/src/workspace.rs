//! Per-execution scratch workspaces.
//!
//! Each execution gets a private temporary directory that exists for
//! exactly one run. The directory (and everything the untrusted code
//! wrote into it) is removed when the [`Workspace`] is dropped, on both
//! the success and the failure path.

use codebox_core::{Error, Language, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch directory owned by a single execution.
///
/// The layout mirrors what the backend mounts: a `workdir/` subdirectory
/// under a uniquely named temporary root. Untrusted code only ever sees
/// `workdir/`.
#[derive(Debug)]
pub struct Workspace {
    root: TempDir,
    workdir: PathBuf,
}

impl Workspace {
    /// Creates a fresh workspace with an empty `workdir/`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the temporary directory cannot be set up.
    pub fn create() -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("codebox-exec-")
            .tempdir()
            .map_err(|e| Error::io("failed to create workspace", e))?;
        let workdir = root.path().join("workdir");
        std::fs::create_dir(&workdir)
            .map_err(|e| Error::io("failed to create workspace workdir", e))?;
        tracing::debug!(path = %workdir.display(), "workspace created");
        Ok(Self { root, workdir })
    }

    /// Returns the directory the backend mounts and runs in.
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Returns the workspace root (the parent of `workdir/`).
    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Populates `workdir/` from a caller-supplied archive.
    ///
    /// # Errors
    ///
    /// Propagates archive decode and path-safety failures from
    /// [`codebox_archive::extract`].
    pub fn hydrate(&self, archive: &[u8]) -> Result<()> {
        codebox_archive::extract(archive, &self.workdir)
    }

    /// Writes the (already wrapped) source text to the language's
    /// conventional file name inside `workdir/`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be written.
    pub fn write_source(&self, language: Language, contents: &str) -> Result<PathBuf> {
        let path = self.workdir.join(language.source_file_name());
        std::fs::write(&path, contents)
            .map_err(|e| Error::io(format!("failed to write {}", language.source_file_name()), e))?;
        Ok(path)
    }

    /// Packages `workdir/` as the artifact archive, applying exclusions.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`codebox_archive::create`].
    pub fn package_artifacts(&self, exclude_patterns: &[String]) -> Result<Vec<u8>> {
        codebox_archive::create(&self.workdir, exclude_patterns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_yields_empty_workdir() {
        let ws = Workspace::create().unwrap();
        assert!(ws.workdir().is_dir());
        assert!(ws.workdir().starts_with(ws.root()));
        assert_eq!(std::fs::read_dir(ws.workdir()).unwrap().count(), 0);
    }

    #[test]
    fn root_carries_recognizable_prefix() {
        let ws = Workspace::create().unwrap();
        let name = ws.root().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("codebox-exec-"), "got {name}");
    }

    #[test]
    fn drop_removes_everything() {
        let ws = Workspace::create().unwrap();
        let root = ws.root().to_path_buf();
        ws.write_source(Language::Python, "print('hi')").unwrap();
        assert!(root.exists());
        drop(ws);
        assert!(!root.exists());
    }

    #[test]
    fn write_source_uses_language_file_name() {
        let ws = Workspace::create().unwrap();
        let path = ws.write_source(Language::Go, "package main").unwrap();
        assert_eq!(path, ws.workdir().join("main.go"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "package main");
    }

    #[test]
    fn hydrate_then_package_round_trips() {
        let src = Workspace::create().unwrap();
        src.write_source(Language::Python, "print('x')").unwrap();
        std::fs::write(src.workdir().join("data.txt"), "payload").unwrap();
        let archive = src.package_artifacts(&[]).unwrap();

        let dst = Workspace::create().unwrap();
        dst.hydrate(&archive).unwrap();
        assert_eq!(
            std::fs::read_to_string(dst.workdir().join("data.txt")).unwrap(),
            "payload"
        );
        assert!(dst.workdir().join("main.py").exists());
    }

    #[test]
    fn hydrate_rejects_garbage() {
        let ws = Workspace::create().unwrap();
        let err = ws.hydrate(b"not an archive").unwrap_err();
        assert!(err.is_input_error());
    }
}
