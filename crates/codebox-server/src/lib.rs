//! MCP protocol front-end for the codebox sandbox.
//!
//! The library half of the server binary: wire types and the rmcp
//! service. Kept as a library so the service can be exercised in tests
//! without a transport.

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod service;
pub mod types;

pub use service::CodeboxService;
pub use types::{ExecuteParams, ExecuteResponse};
