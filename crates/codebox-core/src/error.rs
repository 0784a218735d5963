//! Error types for the codebox sandbox.
//!
//! This module provides the error hierarchy shared by every crate in the
//! workspace. The variants map onto the failure classes the server reports
//! to callers: request-validation failures, resource-limit failures,
//! backend/environment failures, and configuration problems.
//!
//! # Examples
//!
//! ```
//! use codebox_core::{Error, Result};
//!
//! fn check_language(name: &str) -> Result<()> {
//!     if name != "python" {
//!         return Err(Error::UnsupportedLanguage {
//!             language: name.to_string(),
//!         });
//!     }
//!     Ok(())
//! }
//!
//! let err = check_language("cobol").unwrap_err();
//! assert!(err.is_input_error());
//! ```

use thiserror::Error;

/// Main error type for codebox operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested language is not one of the supported runtimes.
    #[error("unsupported language: {language}")]
    UnsupportedLanguage {
        /// The language identifier that was requested
        language: String,
    },

    /// The supplied workdir archive could not be decoded.
    #[error("invalid archive: {message}")]
    InvalidArchive {
        /// Description of the decoding failure
        message: String,
    },

    /// An archive entry attempted to escape the extraction directory.
    ///
    /// Raised for entries with parent-directory segments, absolute names,
    /// or joined paths that resolve outside the destination. Extraction
    /// stops at the first offending entry.
    #[error("unsafe path in archive: {name}")]
    UnsafeArchivePath {
        /// The raw entry name from the archive header
        name: String,
    },

    /// An archive entry has a type the codec refuses to materialize.
    ///
    /// Only directories and regular files are supported; symlinks and
    /// device nodes are rejected to prevent link-based workspace escapes.
    #[error("unsupported archive entry type for {name}: {kind}")]
    UnsupportedArchiveEntry {
        /// The entry name from the archive header
        name: String,
        /// Human-readable entry type (e.g. "symlink")
        kind: String,
    },

    /// The packaged artifact archive exceeds the configured maximum size.
    #[error("artifacts size exceeds limit: {size} bytes > {limit} bytes")]
    ArtifactsTooLarge {
        /// Size of the produced archive in bytes
        size: u64,
        /// Configured maximum in bytes
        limit: u64,
    },

    /// A backend invocation failed for environmental reasons.
    ///
    /// This covers a missing container runtime, spawn failures, and stop
    /// failures - misconfiguration of the host rather than anything about
    /// the caller's code. Non-zero program exits are *not* errors.
    #[error("backend failure: {message}")]
    Backend {
        /// Description of the invocation failure
        message: String,
        /// Underlying cause, when one exists
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Settings are invalid, contradictory, or missing required fields.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },

    /// A filesystem operation failed.
    #[error("{message}")]
    Io {
        /// What the operation was trying to do
        message: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Wraps an I/O error with context about the failed operation.
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Creates a backend error without an underlying cause.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// Returns `true` if this error was caused by the caller's request.
    ///
    /// Input errors are detected before any backend is invoked and are
    /// reported as request-validation failures.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedLanguage { .. }
                | Self::InvalidArchive { .. }
                | Self::UnsafeArchivePath { .. }
                | Self::UnsupportedArchiveEntry { .. }
        )
    }

    /// Returns `true` if this is an artifact size-limit error.
    #[must_use]
    pub const fn is_size_limit(&self) -> bool {
        matches!(self, Self::ArtifactsTooLarge { .. })
    }

    /// Returns `true` if this is a backend invocation failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use codebox_core::Error;
    ///
    /// let err = Error::backend("docker binary not found");
    /// assert!(err.is_backend_error());
    /// assert!(!err.is_input_error());
    /// ```
    #[must_use]
    pub const fn is_backend_error(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }

    /// Returns `true` if this is a configuration error.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;
