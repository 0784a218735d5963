//! The execution orchestrator.
//!
//! [`Sandbox`] drives one request through its whole lifecycle: validate
//! the language, prepare and hydrate a workspace, write the wrapped
//! source, invoke the backend under its deadline, then either package
//! artifacts or emit the timeout result. Each request owns exactly one
//! workspace, and the workspace is removed when the run finishes,
//! whichever way it finishes.

use crate::backend::{self, Backend};
use crate::workspace::Workspace;
use async_trait::async_trait;
use codebox_core::{Error, ExecuteRequest, ExecuteResult, Result, Settings};
use std::sync::Arc;

/// Executes sandboxed code requests.
///
/// This is the seam the protocol layer depends on; tests substitute
/// their own implementation to exercise the server without a container
/// runtime.
#[async_trait]
pub trait SandboxExecutor: Send + Sync {
    /// Runs one request to completion.
    ///
    /// # Errors
    ///
    /// Returns request-validation errors, backend invocation failures,
    /// and artifact size-limit violations. A timeout is not an error;
    /// it is reported in the result with the timeout sentinel.
    async fn execute(&self, request: ExecuteRequest) -> Result<ExecuteResult>;
}

/// The production orchestrator: one backend, immutable settings.
pub struct Sandbox {
    settings: Arc<Settings>,
    backend: Box<dyn Backend>,
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}

impl Sandbox {
    /// Creates an orchestrator with an explicit backend.
    #[must_use]
    pub fn new(settings: Arc<Settings>, backend: Box<dyn Backend>) -> Self {
        Self { settings, backend }
    }

    /// Creates an orchestrator with the backend the settings select.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a disallowed backend selection.
    pub fn from_settings(settings: Arc<Settings>) -> Result<Self> {
        let backend = backend::for_settings(&settings)?;
        Ok(Self::new(settings, backend))
    }
}

#[async_trait]
impl SandboxExecutor for Sandbox {
    async fn execute(&self, request: ExecuteRequest) -> Result<ExecuteResult> {
        let language = request.language;
        let spec = self.settings.language(language)?.clone();

        let workspace = Workspace::create()?;
        if let Some(archive) = &request.workdir_archive {
            tracing::debug!(%language, bytes = archive.len(), "hydrating workspace");
            workspace.hydrate(archive)?;
        }

        let wrapped = self.settings.wrap_code(language, &request.code)?;
        workspace.write_source(language, &wrapped)?;

        tracing::info!(
            %language,
            backend = self.backend.name(),
            timeout_secs = request.limits.timeout.as_secs(),
            "executing request"
        );
        let outcome = self
            .backend
            .run(workspace.workdir(), language, &spec, &request.limits)
            .await?;

        if outcome.timed_out {
            tracing::info!(%language, "execution timed out");
            return Ok(ExecuteResult::timed_out(outcome.stdout, outcome.stderr));
        }

        let artifacts = workspace.package_artifacts(&spec.exclude_patterns)?;
        let limit = self.settings.max_artifact_size_bytes();
        if artifacts.len() as u64 > limit {
            return Err(Error::ArtifactsTooLarge {
                size: artifacts.len() as u64,
                limit,
            });
        }

        tracing::info!(
            %language,
            exit_code = outcome.exit_code,
            artifact_bytes = artifacts.len(),
            "execution finished"
        );
        Ok(ExecuteResult {
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            exit_code: outcome.exit_code,
            artifacts_archive: artifacts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RunOutcome;
    use codebox_core::Language;
    use flate2::Compression;
    use flate2::read::GzDecoder;
    use flate2::write::GzEncoder;
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// Test double that optionally mutates the workspace the way real
    /// code would before reporting a fixed outcome.
    struct StubBackend {
        outcome: RunOutcome,
        write_files: Vec<(String, Vec<u8>)>,
    }

    impl StubBackend {
        fn returning(outcome: RunOutcome) -> Self {
            Self {
                outcome,
                write_files: Vec::new(),
            }
        }

        fn writing(files: Vec<(String, Vec<u8>)>) -> Self {
            Self {
                outcome: RunOutcome::default(),
                write_files: files,
            }
        }
    }

    #[async_trait]
    impl Backend for StubBackend {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn run(
            &self,
            workdir: &Path,
            _language: Language,
            _spec: &codebox_core::LanguageSpec,
            _limits: &codebox_core::ResourceLimits,
        ) -> Result<RunOutcome> {
            for (rel, contents) in &self.write_files {
                let path = workdir.join(rel);
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, contents).unwrap();
            }
            Ok(self.outcome.clone())
        }
    }

    fn sandbox_with(backend: StubBackend) -> Sandbox {
        Sandbox::new(Arc::new(Settings::default()), Box::new(backend))
    }

    fn archive_names(archive: &[u8]) -> Vec<String> {
        let mut tar = tar::Archive::new(GzDecoder::new(archive));
        tar.entries()
            .unwrap()
            .map(|e| {
                String::from_utf8_lossy(&e.unwrap().path_bytes()).into_owned()
            })
            .collect()
    }

    fn archive_of(files: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(name).unwrap();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[tokio::test]
    async fn writes_wrapped_source_before_invoking_backend() {
        let backend = Arc::new(SharedStub::default());
        let sandbox = Sandbox::new(
            Arc::new(Settings::default()),
            Box::new(SharedStubHandle(Arc::clone(&backend))),
        );

        sandbox
            .execute(ExecuteRequest::new(Language::Python, "print('hi')"))
            .await
            .unwrap();

        let seen = backend.seen_source.lock().unwrap().clone().unwrap();
        assert!(seen.contains("signal.alarm(10)"));
        assert!(seen.contains("print('hi')"));
        assert!(seen.ends_with("signal.alarm(0)"));
    }

    /// Stub whose observations outlive the sandbox that consumed it.
    #[derive(Default)]
    struct SharedStub {
        outcome: RunOutcome,
        write_files: Vec<(String, Vec<u8>)>,
        seen_source: Mutex<Option<String>>,
        seen_workdir: Mutex<Option<PathBuf>>,
    }

    struct SharedStubHandle(Arc<SharedStub>);

    #[async_trait]
    impl Backend for SharedStubHandle {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn run(
            &self,
            workdir: &Path,
            language: Language,
            _spec: &codebox_core::LanguageSpec,
            _limits: &codebox_core::ResourceLimits,
        ) -> Result<RunOutcome> {
            let source = std::fs::read_to_string(workdir.join(language.source_file_name())).ok();
            *self.0.seen_source.lock().unwrap() = source;
            *self.0.seen_workdir.lock().unwrap() = Some(workdir.to_path_buf());
            for (rel, contents) in &self.0.write_files {
                let path = workdir.join(rel);
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, contents).unwrap();
            }
            Ok(self.0.outcome.clone())
        }
    }

    #[tokio::test]
    async fn hydrates_workspace_from_request_archive() {
        let backend = Arc::new(SharedStub {
            write_files: vec![("copy.txt".to_string(), b"seen".to_vec())],
            ..SharedStub::default()
        });
        let sandbox = Sandbox::new(
            Arc::new(Settings::default()),
            Box::new(SharedStubHandle(Arc::clone(&backend))),
        );

        let archive = archive_of(&[("input.txt", b"seed data")]);
        let request =
            ExecuteRequest::new(Language::Go, "package main").with_workdir_archive(archive);
        let result = sandbox.execute(request).await.unwrap();

        // The hydrated file and the backend's own output both land in
        // the artifact archive.
        let names = archive_names(&result.artifacts_archive);
        assert!(names.contains(&"input.txt".to_string()));
        assert!(names.contains(&"copy.txt".to_string()));
        assert!(names.contains(&"main.go".to_string()));
    }

    #[tokio::test]
    async fn artifacts_respect_exclusion_patterns() {
        let backend = StubBackend::writing(vec![
            ("result.txt".to_string(), b"keep".to_vec()),
            ("cache.pyc".to_string(), b"drop".to_vec()),
            ("__pycache__/mod.pyc".to_string(), b"drop".to_vec()),
        ]);
        let sandbox = sandbox_with(backend);

        let result = sandbox
            .execute(ExecuteRequest::new(Language::Python, "pass"))
            .await
            .unwrap();

        let names = archive_names(&result.artifacts_archive);
        assert!(names.contains(&"result.txt".to_string()));
        assert!(!names.iter().any(|n| n.contains("pyc")));
    }

    #[tokio::test]
    async fn passes_through_nonzero_exit_with_artifacts() {
        let backend = StubBackend {
            outcome: RunOutcome {
                stdout: "partial\n".to_string(),
                stderr: "boom\n".to_string(),
                exit_code: 2,
                timed_out: false,
            },
            write_files: vec![("log.txt".to_string(), b"trace".to_vec())],
        };
        let sandbox = sandbox_with(backend);

        let result = sandbox
            .execute(ExecuteRequest::new(Language::Python, "raise SystemExit(2)"))
            .await
            .unwrap();

        assert_eq!(result.exit_code, 2);
        assert_eq!(result.stdout, "partial\n");
        assert_eq!(result.stderr, "boom\n");
        assert!(archive_names(&result.artifacts_archive).contains(&"log.txt".to_string()));
    }

    #[tokio::test]
    async fn timeout_produces_sentinel_result() {
        let backend = StubBackend::returning(RunOutcome {
            stdout: "partial".to_string(),
            stderr: String::new(),
            exit_code: -1,
            timed_out: true,
        });
        let sandbox = sandbox_with(backend);

        let result = sandbox
            .execute(ExecuteRequest::new(Language::Python, "while True: pass"))
            .await
            .unwrap();

        assert!(result.is_timeout());
        assert_eq!(result.stdout, "partial");
        assert!(result.artifacts_archive.is_empty());
    }

    #[tokio::test]
    async fn oversized_artifacts_are_rejected() {
        // Pseudo-random bytes compress poorly, so 4 MiB of them cannot
        // fit under a 1 MiB archive cap.
        let mut noise = vec![0u8; 4 * 1024 * 1024];
        let mut state = 0x2545_f491_4f6c_dd1d_u64;
        for byte in &mut noise {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            *byte = (state >> 33) as u8;
        }
        let backend = StubBackend::writing(vec![("big.bin".to_string(), noise)]);

        let mut settings = Settings::default();
        settings.sandbox.max_artifact_size_mb = 1;
        let sandbox = Sandbox::new(Arc::new(settings), Box::new(backend));

        let err = sandbox
            .execute(ExecuteRequest::new(Language::Python, "pass"))
            .await
            .unwrap_err();

        assert!(err.is_size_limit());
    }

    #[tokio::test]
    async fn invalid_request_archive_fails_before_backend() {
        let sandbox = sandbox_with(StubBackend::returning(RunOutcome::default()));
        let request = ExecuteRequest::new(Language::Python, "pass")
            .with_workdir_archive(b"garbage".to_vec());

        let err = sandbox.execute(request).await.unwrap_err();
        assert!(err.is_input_error());
    }

    #[tokio::test]
    async fn unconfigured_language_is_rejected() {
        let mut settings = Settings::default();
        settings.languages = BTreeMap::new();
        let sandbox = Sandbox::new(
            Arc::new(settings),
            Box::new(StubBackend::returning(RunOutcome::default())),
        );

        let err = sandbox
            .execute(ExecuteRequest::new(Language::Python, "pass"))
            .await
            .unwrap_err();
        assert!(err.is_input_error());
    }

    #[tokio::test]
    async fn workspace_is_removed_after_execution() {
        let backend = Arc::new(SharedStub::default());
        let sandbox = Sandbox::new(
            Arc::new(Settings::default()),
            Box::new(SharedStubHandle(Arc::clone(&backend))),
        );

        sandbox
            .execute(ExecuteRequest::new(Language::Python, "pass"))
            .await
            .unwrap();

        let workdir = backend.seen_workdir.lock().unwrap().clone().unwrap();
        assert!(!workdir.exists());
    }
}
