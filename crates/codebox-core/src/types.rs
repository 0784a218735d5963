//! Domain types for sandboxed execution.
//!
//! The request/result pair here is the contract between the protocol
//! front-end and the execution orchestrator: a request is immutable once
//! constructed and owned by exactly one execution, and a result is
//! produced exactly once per request.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Exit code reported when an execution hits its wall-clock deadline.
pub const TIMEOUT_EXIT_CODE: i32 = 1;

/// Line appended to stderr when an execution hits its deadline.
pub const TIMEOUT_NOTICE: &str = "Execution timed out";

/// Supported execution runtimes.
///
/// The set is fixed; language-specific behavior (image, run command,
/// code hooks, exclusions) comes from [`crate::Settings`].
///
/// # Examples
///
/// ```
/// use codebox_core::Language;
///
/// let lang: Language = "python".parse().unwrap();
/// assert_eq!(lang.source_file_name(), "main.py");
/// assert!("cobol".parse::<Language>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python 3 (interpreted)
    Python,
    /// Node.js (interpreted)
    #[serde(rename = "nodejs")]
    NodeJs,
    /// Go (compiled then run)
    Go,
    /// C++ (compiled then run)
    Cpp,
}

impl Language {
    /// All supported languages, in declaration order.
    pub const ALL: [Self; 4] = [Self::Python, Self::NodeJs, Self::Go, Self::Cpp];

    /// Returns the canonical identifier used on the wire and in settings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::NodeJs => "nodejs",
            Self::Go => "go",
            Self::Cpp => "cpp",
        }
    }

    /// Returns the conventional source file name for this language.
    ///
    /// The caller's code is written to this file inside the workspace
    /// before the backend runs.
    #[must_use]
    pub const fn source_file_name(self) -> &'static str {
        match self {
            Self::Python => "main.py",
            Self::NodeJs => "index.js",
            Self::Go => "main.go",
            Self::Cpp => "main.cpp",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "python" => Ok(Self::Python),
            "nodejs" => Ok(Self::NodeJs),
            "go" => Ok(Self::Go),
            "cpp" => Ok(Self::Cpp),
            other => Err(Error::UnsupportedLanguage {
                language: other.to_string(),
            }),
        }
    }
}

/// Resource and isolation parameters for one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Hard wall-clock deadline for the backend invocation.
    pub timeout: Duration,
    /// Memory ceiling for the container, in megabytes.
    pub memory_mb: u32,
    /// Whether the execution gets bridged network access.
    ///
    /// Off by default; the container runs with no network at all.
    pub network_enabled: bool,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            memory_mb: 512,
            network_enabled: false,
        }
    }
}

/// Parameters for one sandboxed code execution.
///
/// Immutable once constructed; each request is owned by exactly one
/// orchestrator invocation for its lifetime.
///
/// # Examples
///
/// ```
/// use codebox_core::{ExecuteRequest, Language};
/// use std::time::Duration;
///
/// let req = ExecuteRequest::new(Language::Python, "print('hi')")
///     .with_timeout(Duration::from_secs(5));
/// assert!(req.workdir_archive.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    /// Requested runtime.
    pub language: Language,
    /// Caller-supplied source text. Untrusted.
    pub code: String,
    /// Optional gzip-compressed tar snapshot of the initial workspace.
    pub workdir_archive: Option<Vec<u8>>,
    /// Resource and isolation parameters.
    pub limits: ResourceLimits,
}

impl ExecuteRequest {
    /// Creates a request with default limits and no initial workspace.
    #[must_use]
    pub fn new(language: Language, code: impl Into<String>) -> Self {
        Self {
            language,
            code: code.into(),
            workdir_archive: None,
            limits: ResourceLimits::default(),
        }
    }

    /// Sets the initial workspace archive.
    #[must_use]
    pub fn with_workdir_archive(mut self, archive: Vec<u8>) -> Self {
        self.workdir_archive = Some(archive);
        self
    }

    /// Sets the wall-clock deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.limits.timeout = timeout;
        self
    }

    /// Replaces all resource limits.
    #[must_use]
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// Outcome of one sandboxed code execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Observed process exit status, or [`TIMEOUT_EXIT_CODE`] on timeout.
    pub exit_code: i32,
    /// Gzip-compressed tar of the post-execution workspace.
    ///
    /// Empty on timeout, and when every workspace path was excluded.
    pub artifacts_archive: Vec<u8>,
}

impl ExecuteResult {
    /// Builds the synthetic result for a deadline expiry.
    ///
    /// Partial output captured before the kill is preserved, stderr gains
    /// a trailing timeout notice, and the artifact set is empty - the
    /// workspace is not read once a timeout has been declared.
    #[must_use]
    pub fn timed_out(stdout: String, stderr: String) -> Self {
        Self {
            stdout,
            stderr: format!("{stderr}\n{TIMEOUT_NOTICE}"),
            exit_code: TIMEOUT_EXIT_CODE,
            artifacts_archive: Vec::new(),
        }
    }

    /// Returns `true` if this result carries the timeout sentinel.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.exit_code == TIMEOUT_EXIT_CODE && self.stderr.ends_with(TIMEOUT_NOTICE)
    }
}
