//! Core types, errors, and settings for the codebox sandbox.
//!
//! This crate provides the foundational pieces shared by the archive
//! codec, the execution backends, and the MCP server:
//!
//! - The [`Error`] hierarchy and [`Result`] alias
//! - Domain types ([`Language`], [`ExecuteRequest`], [`ExecuteResult`])
//! - Validated process-wide [`Settings`]

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod error;
mod settings;
mod types;

pub use error::{Error, Result};
pub use settings::{BackendKind, LanguageSpec, SandboxSettings, ServerSettings, Settings};
pub use types::{
    ExecuteRequest, ExecuteResult, Language, ResourceLimits, TIMEOUT_EXIT_CODE, TIMEOUT_NOTICE,
};
