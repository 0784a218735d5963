//! Exclusion pattern matching for artifact archives.
//!
//! Patterns come from per-language settings and control which workspace
//! paths are omitted from the output archive. A pattern ending in `/` is
//! a directory rule matching the directory itself and everything beneath
//! it at any depth; any other pattern is a glob matched against both the
//! entry's base name and its full relative path. Matching is a logical OR
//! over all patterns, so ordering never changes the outcome.
//!
//! # Examples
//!
//! ```
//! use codebox_archive::is_excluded;
//!
//! let patterns = vec!["__pycache__/".to_string(), "*.pyc".to_string()];
//! assert!(is_excluded("__pycache__/cache.pyc", &patterns));
//! assert!(is_excluded("src/module.pyc", &patterns));
//! assert!(!is_excluded("main.py", &patterns));
//! ```

use glob::Pattern;

/// Directory names conventionally produced by toolchains.
///
/// A bare pattern equal to one of these names is assumed to target the
/// directory, not a regular file that happens to share the name; only an
/// explicit trailing `/` applies it, and only as a directory rule. This
/// keeps a legitimately named file (say, a script called `build`) out of
/// the blast radius of a sloppy directory exclusion.
const COMMON_DIR_NAMES: &[&str] = &[
    "node_modules",
    "__pycache__",
    ".git",
    ".svn",
    ".hg",
    "build",
    "dist",
    "target",
    "bin",
    "obj",
    "vendor",
    ".pytest_cache",
];

/// Decides whether a workspace path is excluded from the output archive.
///
/// `rel_path` is the entry's path relative to the workspace root, with
/// `/` separators. The function is pure: no filesystem or archive state
/// is consulted, and repeated calls with the same arguments always agree.
///
/// Malformed glob patterns never match - exclusion fails open to
/// inclusion, never to an error.
#[must_use]
pub fn is_excluded(rel_path: &str, patterns: &[String]) -> bool {
    for pattern in patterns {
        // A bare pattern that coincides with a conventional directory
        // name does not apply to a same-named regular file.
        if rel_path == pattern && !pattern.ends_with('/') && is_common_dir_name(pattern) {
            continue;
        }

        if let Some(dir) = pattern.strip_suffix('/') {
            if rel_path == dir || rel_path.starts_with(&format!("{dir}/")) {
                return true;
            }
            // The directory may appear anywhere in the ancestry, e.g.
            // "frontend/node_modules/react.js" for "node_modules/".
            if rel_path.split('/').any(|segment| segment == dir) {
                return true;
            }
        } else {
            let base = rel_path.rsplit('/').next().unwrap_or(rel_path);
            if glob_matches(pattern, base) || glob_matches(pattern, rel_path) {
                return true;
            }
        }
    }
    false
}

fn glob_matches(pattern: &str, text: &str) -> bool {
    Pattern::new(pattern).is_ok_and(|p| p.matches(text))
}

fn is_common_dir_name(name: &str) -> bool {
    COMMON_DIR_NAMES.contains(&name)
}
