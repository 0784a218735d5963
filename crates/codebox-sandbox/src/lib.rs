//! Sandboxed execution for the codebox server.
//!
//! The crate is organized around one seam: the [`Backend`] trait turns a
//! prepared workspace into captured output, and the [`Sandbox`]
//! orchestrator does everything around that invocation. Container
//! backends (Docker, Podman) share one implementation; a non-isolating
//! local backend exists for development and is gated behind an explicit
//! settings opt-in.

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod backend;
mod container;
mod executor;
mod local;
mod workspace;

pub use backend::{Backend, RunOutcome, for_settings};
pub use container::{ContainerBackend, ContainerRuntime};
pub use executor::{Sandbox, SandboxExecutor};
pub use local::LocalBackend;
pub use workspace::Workspace;
