//! Process-wide settings for the codebox server.
//!
//! Settings are loaded once at startup from a TOML file, validated, and
//! treated as read-only for the remainder of the process lifetime. They
//! are passed explicitly to the orchestrator and backends rather than
//! accessed through ambient global state, which keeps the core testable.
//!
//! # File discovery
//!
//! [`Settings::load`] checks, in order: an explicit path argument, the
//! `CODEBOX_CONFIG` environment variable, `./codebox.toml`, and
//! `./config/codebox.toml`. When no file is found the built-in defaults
//! are used.
//!
//! # Examples
//!
//! ```
//! use codebox_core::{Language, Settings};
//!
//! let settings = Settings::default();
//! assert!(settings.validate().is_ok());
//!
//! let python = settings.language(Language::Python).unwrap();
//! assert_eq!(python.image, "python:3.11-slim");
//! ```

use crate::{Error, Language, ResourceLimits, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MEMORY_MB: u32 = 512;
const DEFAULT_MAX_ARTIFACT_SIZE_MB: u64 = 20;

const PYTHON_PREFIX: &str = "\
import signal, sys

def timeout_handler(signum, frame):
    print('Execution timeout!')
    sys.exit(1)

signal.signal(signal.SIGALRM, timeout_handler)
signal.alarm(10)
";

/// Which execution backend drives the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Docker container runtime.
    Docker,
    /// Podman container runtime.
    Podman,
    /// Direct host execution. Development only; provides no isolation
    /// and must be explicitly allowed via `allow_local_backend`.
    Local,
}

impl BackendKind {
    /// Returns the identifier used in settings files and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
            Self::Local => "local",
        }
    }
}

/// Server transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Transport for the MCP protocol. Only `stdio` is supported.
    pub transport: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            transport: "stdio".to_string(),
        }
    }
}

/// Sandbox execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    /// Backend variant used for all executions.
    pub backend: BackendKind,
    /// Default wall-clock deadline per execution, in seconds.
    pub timeout_secs: u64,
    /// Default memory ceiling per execution, in megabytes.
    pub memory_mb: u32,
    /// Maximum size of the packaged artifact archive, in megabytes.
    pub max_artifact_size_mb: u64,
    /// Whether executions get bridged network access.
    pub network_enabled: bool,
    /// Opt-in gate for the non-isolating local backend.
    pub allow_local_backend: bool,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Docker,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            memory_mb: DEFAULT_MEMORY_MB,
            max_artifact_size_mb: DEFAULT_MAX_ARTIFACT_SIZE_MB,
            network_enabled: false,
            allow_local_backend: false,
        }
    }
}

/// Static per-language execution metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageSpec {
    /// Container image for the container backends.
    pub image: String,
    /// Shell command that builds (if needed) and runs the written source.
    pub run_command: String,
    /// Text prepended to the caller's code before it is written.
    pub prefix_code: String,
    /// Text appended to the caller's code before it is written.
    pub postfix_code: String,
    /// Environment variables injected into the execution.
    pub environment: BTreeMap<String, String>,
    /// Patterns excluded from the artifact archive.
    pub exclude_patterns: Vec<String>,
}

/// Immutable process-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Protocol transport settings.
    pub server: ServerSettings,
    /// Sandbox execution settings.
    pub sandbox: SandboxSettings,
    /// Per-language metadata, keyed by language identifier.
    pub languages: BTreeMap<Language, LanguageSpec>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            sandbox: SandboxSettings::default(),
            languages: default_languages(),
        }
    }
}

fn default_languages() -> BTreeMap<Language, LanguageSpec> {
    let mut languages = BTreeMap::new();
    languages.insert(
        Language::Python,
        LanguageSpec {
            image: "python:3.11-slim".to_string(),
            run_command: "python main.py".to_string(),
            prefix_code: PYTHON_PREFIX.to_string(),
            postfix_code: "\nsignal.alarm(0)".to_string(),
            exclude_patterns: vec!["__pycache__/".to_string(), "*.pyc".to_string()],
            ..LanguageSpec::default()
        },
    );
    languages.insert(
        Language::NodeJs,
        LanguageSpec {
            image: "node:20-alpine".to_string(),
            run_command: "node index.js".to_string(),
            exclude_patterns: vec!["node_modules/".to_string()],
            ..LanguageSpec::default()
        },
    );
    languages.insert(
        Language::Go,
        LanguageSpec {
            image: "golang:1.23-alpine".to_string(),
            run_command: "go build -o app main.go && ./app".to_string(),
            ..LanguageSpec::default()
        },
    );
    languages.insert(
        Language::Cpp,
        LanguageSpec {
            image: "gcc:13".to_string(),
            run_command: "g++ -std=c++17 -O2 -o app main.cpp && ./app".to_string(),
            ..LanguageSpec::default()
        },
    );
    languages
}

impl Settings {
    /// Loads settings from a TOML file, falling back to defaults.
    ///
    /// Languages missing from the file keep their built-in specs, so a
    /// settings file only needs to name what it changes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed,
    /// or if the resulting settings fail validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match Self::discover(path)? {
            Some((path, contents)) => {
                tracing::info!(path = %path.display(), "loading settings");
                toml::from_str::<Self>(&contents).map_err(|e| Error::Config {
                    message: format!("failed to parse {}: {e}", path.display()),
                })?
            }
            None => {
                tracing::info!("no settings file found, using defaults");
                Self::default()
            }
        };

        for (language, spec) in default_languages() {
            settings.languages.entry(language).or_insert(spec);
        }

        settings.validate()?;
        Ok(settings)
    }

    fn discover(path: Option<&Path>) -> Result<Option<(std::path::PathBuf, String)>> {
        if let Some(path) = path {
            let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
                message: format!("failed to read {}: {e}", path.display()),
            })?;
            return Ok(Some((path.to_path_buf(), contents)));
        }

        let mut candidates = Vec::new();
        if let Ok(env_path) = std::env::var("CODEBOX_CONFIG") {
            candidates.push(std::path::PathBuf::from(env_path));
        }
        candidates.push("codebox.toml".into());
        candidates.push("config/codebox.toml".into());

        for candidate in candidates {
            if let Ok(contents) = std::fs::read_to_string(&candidate) {
                return Ok(Some((candidate, contents)));
            }
        }
        Ok(None)
    }

    /// Validates field ranges and cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.server.transport != "stdio" {
            return Err(Error::Config {
                message: format!(
                    "unsupported server.transport: {} (only stdio is supported)",
                    self.server.transport
                ),
            });
        }
        if self.sandbox.timeout_secs == 0 {
            return Err(Error::Config {
                message: "sandbox.timeout_secs must be positive".to_string(),
            });
        }
        if self.sandbox.memory_mb == 0 {
            return Err(Error::Config {
                message: "sandbox.memory_mb must be positive".to_string(),
            });
        }
        if self.sandbox.max_artifact_size_mb == 0 {
            return Err(Error::Config {
                message: "sandbox.max_artifact_size_mb must be positive".to_string(),
            });
        }
        if self.sandbox.backend == BackendKind::Local && !self.sandbox.allow_local_backend {
            return Err(Error::Config {
                message: "sandbox.backend is local but sandbox.allow_local_backend is not set"
                    .to_string(),
            });
        }
        for language in Language::ALL {
            let spec = self.language(language)?;
            if spec.run_command.trim().is_empty() {
                return Err(Error::Config {
                    message: format!("languages.{language}.run_command must not be empty"),
                });
            }
            if self.sandbox.backend != BackendKind::Local && spec.image.trim().is_empty() {
                return Err(Error::Config {
                    message: format!("languages.{language}.image must not be empty"),
                });
            }
        }
        Ok(())
    }

    /// Returns the spec for a language.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedLanguage`] if the language has no
    /// configured spec.
    pub fn language(&self, language: Language) -> Result<&LanguageSpec> {
        self.languages
            .get(&language)
            .ok_or_else(|| Error::UnsupportedLanguage {
                language: language.to_string(),
            })
    }

    /// Wraps caller code with the language's prefix and postfix hooks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedLanguage`] if the language has no
    /// configured spec.
    pub fn wrap_code(&self, language: Language, code: &str) -> Result<String> {
        let spec = self.language(language)?;
        Ok(format!(
            "{}{}{}",
            spec.prefix_code, code, spec.postfix_code
        ))
    }

    /// Returns the default per-request resource limits.
    #[must_use]
    pub fn default_limits(&self) -> ResourceLimits {
        ResourceLimits {
            timeout: self.timeout(),
            memory_mb: self.sandbox.memory_mb,
            network_enabled: self.sandbox.network_enabled,
        }
    }

    /// Returns the execution deadline as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.sandbox.timeout_secs)
    }

    /// Returns the artifact size cap in bytes.
    #[must_use]
    pub const fn max_artifact_size_bytes(&self) -> u64 {
        self.sandbox.max_artifact_size_mb * 1024 * 1024
    }
}
