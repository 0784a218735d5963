//! Direct host execution, for development machines without a container
//! runtime.
//!
//! This backend provides no isolation whatsoever: code runs as the
//! server's own user with the server's own filesystem view. It is gated
//! behind an explicit settings opt-in and refuses to exist otherwise
//! (see [`crate::backend::for_settings`]).

use crate::backend::{Backend, RunOutcome, run_with_deadline};
use async_trait::async_trait;
use codebox_core::{Language, LanguageSpec, ResourceLimits, Result};
use std::path::Path;
use tokio::process::Command;

/// Runs code directly on the host, confined only by working directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend;

impl LocalBackend {
    /// Creates the local backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn run(
        &self,
        workdir: &Path,
        language: Language,
        spec: &LanguageSpec,
        limits: &ResourceLimits,
    ) -> Result<RunOutcome> {
        tracing::debug!(%language, workdir = %workdir.display(), "starting local execution");
        tracing::warn!("local backend provides no isolation");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&spec.run_command)
            .current_dir(workdir)
            .envs(&spec.environment);

        // Memory limits are not enforceable here; only the deadline is.
        run_with_deadline(cmd, limits.timeout, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn spec(run_command: &str) -> LanguageSpec {
        LanguageSpec {
            run_command: run_command.to_string(),
            ..LanguageSpec::default()
        }
    }

    #[tokio::test]
    async fn runs_in_the_workdir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.txt"), "payload").unwrap();

        let outcome = LocalBackend::new()
            .run(
                dir.path(),
                Language::Python,
                &spec("cat data.txt"),
                &ResourceLimits::default(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.stdout, "payload");
    }

    #[tokio::test]
    async fn injects_configured_environment() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = spec("printf '%s' \"$GREETING\"");
        s.environment
            .insert("GREETING".to_string(), "hello".to_string());

        let outcome = LocalBackend::new()
            .run(dir.path(), Language::Python, &s, &ResourceLimits::default())
            .await
            .unwrap();

        assert_eq!(outcome.stdout, "hello");
    }

    #[tokio::test]
    async fn reports_deadline_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let limits = ResourceLimits {
            timeout: Duration::from_millis(100),
            ..ResourceLimits::default()
        };

        let outcome = LocalBackend::new()
            .run(dir.path(), Language::Python, &spec("sleep 30"), &limits)
            .await
            .unwrap();

        assert!(outcome.timed_out);
    }
}
