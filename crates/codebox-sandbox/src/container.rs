//! Container-based execution via Docker or Podman.
//!
//! Both runtimes take the same CLI surface for everything this backend
//! needs, so one implementation serves both; the runtime choice only
//! selects the program name. Isolation comes from the container runtime:
//! no network by default, a memory ceiling, dropped capabilities, and an
//! unprivileged user.

use crate::backend::{Backend, RunOutcome, run_with_deadline};
use async_trait::async_trait;
use codebox_core::{Language, LanguageSpec, ResourceLimits, Result};
use std::path::Path;
use tokio::process::Command;
use uuid::Uuid;

/// Which container runtime binary to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRuntime {
    /// The `docker` CLI.
    Docker,
    /// The `podman` CLI.
    Podman,
}

impl ContainerRuntime {
    /// Returns the program name invoked on the host.
    #[must_use]
    pub const fn program(self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

/// Runs code inside a hardened, short-lived container.
#[derive(Debug, Clone, Copy)]
pub struct ContainerBackend {
    runtime: ContainerRuntime,
}

impl ContainerBackend {
    /// Creates a backend for the given runtime.
    #[must_use]
    pub const fn new(runtime: ContainerRuntime) -> Self {
        Self { runtime }
    }

    fn run_command(
        &self,
        container_name: &str,
        workdir: &Path,
        spec: &LanguageSpec,
        limits: &ResourceLimits,
    ) -> Command {
        let mut cmd = Command::new(self.runtime.program());
        cmd.arg("run")
            .arg("--name")
            .arg(container_name)
            .arg("--rm")
            .arg("-v")
            .arg(format!("{}:/workdir", workdir.display()))
            .arg("--workdir")
            .arg("/workdir")
            .arg("--memory")
            .arg(format!("{}m", limits.memory_mb))
            .arg("--network")
            .arg(if limits.network_enabled {
                "bridge"
            } else {
                "none"
            })
            .arg("--ulimit")
            .arg("fsize=100000000")
            .arg("--ulimit")
            .arg(format!("cpu={}", limits.timeout.as_secs().max(1)))
            .arg("--security-opt")
            .arg("no-new-privileges:true")
            .arg("--user")
            .arg("nobody")
            .arg("--cap-drop")
            .arg("ALL");

        for (key, value) in &spec.environment {
            cmd.arg("-e").arg(format!("{key}={value}"));
        }

        cmd.arg(&spec.image).arg("sh").arg("-c").arg(&spec.run_command);
        cmd
    }

    fn stop_command(&self, container_name: &str) -> Command {
        let mut cmd = Command::new(self.runtime.program());
        cmd.arg("stop").arg(container_name);
        cmd
    }
}

#[async_trait]
impl Backend for ContainerBackend {
    fn name(&self) -> &'static str {
        self.runtime.program()
    }

    async fn run(
        &self,
        workdir: &Path,
        language: Language,
        spec: &LanguageSpec,
        limits: &ResourceLimits,
    ) -> Result<RunOutcome> {
        let container_name = format!("codebox-exec-{}", Uuid::new_v4());
        tracing::debug!(
            runtime = self.name(),
            %language,
            image = %spec.image,
            container = %container_name,
            "starting container execution"
        );

        // `--rm` handles the normal exit; the stop command only matters
        // when the deadline fires and the container outlives its client.
        run_with_deadline(
            self.run_command(&container_name, workdir, spec, limits),
            limits.timeout,
            Some(self.stop_command(&container_name)),
        )
        .await
    }
}
