//! MCP server entry point for sandboxed code execution.
//!
//! The server speaks MCP over stdio and exposes a single tool,
//! `execute_sandboxed_code`, backed by a container runtime.
//!
//! # Usage
//!
//! Run the server via stdio transport:
//!
//! ```bash
//! codebox
//! ```
//!
//! Or configure in an MCP client:
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "codebox": {
//!       "command": "codebox"
//!     }
//!   }
//! }
//! ```
//!
//! Settings are read from `$CODEBOX_CONFIG`, `./codebox.toml`, or
//! `./config/codebox.toml`, falling back to built-in defaults.

use anyhow::Result;
use codebox_core::Settings;
use codebox_sandbox::Sandbox;
use codebox_server::service::CodeboxService;
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr (stdout is for MCP protocol)
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,codebox=debug")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .init();

    tracing::info!("Starting codebox v{}", env!("CARGO_PKG_VERSION"));

    let settings = Arc::new(Settings::load(None)?);
    tracing::info!(
        backend = settings.sandbox.backend.as_str(),
        timeout_secs = settings.sandbox.timeout_secs,
        "settings loaded"
    );

    let sandbox = Sandbox::from_settings(Arc::clone(&settings))?;
    let service = CodeboxService::new(settings, Arc::new(sandbox));

    let running = service.serve(stdio()).await?;
    running.waiting().await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
