//! Wire types for the `execute_sandboxed_code` tool.
//!
//! Archives cross the protocol boundary as base64 text because MCP tool
//! arguments and results are JSON. Decoding and encoding happen at this
//! boundary; everything inside the workspace deals in raw bytes.

use codebox_core::ExecuteResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Arguments for one sandboxed execution.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteParams {
    /// Language to execute: `python`, `nodejs`, `go`, or `cpp`.
    pub language: String,

    /// Source code to run.
    pub code: String,

    /// Optional base64-encoded tar.gz snapshot of the initial working
    /// directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir_tar: Option<String>,

    /// Wall-clock limit in seconds; defaults to the server setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_sec: Option<u64>,

    /// Memory ceiling in megabytes; defaults to the server setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u32>,

    /// Whether the execution gets network access; defaults to the
    /// server setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<bool>,
}

/// Result of one sandboxed execution.
///
/// Failures the sandbox detects (bad archive, unsupported language,
/// oversized artifacts, a missing container runtime) are reported here
/// with `success = false` rather than as protocol errors, so callers
/// always get a structured answer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteResponse {
    /// Whether the execution ran to a reportable completion.
    pub success: bool,

    /// Captured standard output.
    pub stdout: String,

    /// Captured standard error.
    pub stderr: String,

    /// Process exit status (1 with a timeout notice on deadline expiry).
    pub exit_code: i32,

    /// Base64-encoded tar.gz of the post-execution working directory.
    /// Empty when there are no artifacts.
    pub artifacts_tar: String,

    /// Failure description when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecuteResponse {
    /// Builds the response for a completed execution.
    #[must_use]
    pub fn from_result(result: &ExecuteResult) -> Self {
        use base64::Engine as _;
        let artifacts_tar = if result.artifacts_archive.is_empty() {
            String::new()
        } else {
            base64::engine::general_purpose::STANDARD.encode(&result.artifacts_archive)
        };
        Self {
            success: true,
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
            exit_code: result.exit_code,
            artifacts_tar,
            error: None,
        }
    }

    /// Builds the response for a failed execution.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: -1,
            artifacts_tar: String::new(),
            error: Some(message.into()),
        }
    }
}
