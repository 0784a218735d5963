//! MCP service exposing sandboxed code execution.
//!
//! One tool, `execute_sandboxed_code`: run a snippet in an isolated
//! workspace and get captured output plus an artifact archive back.
//! Sandbox failures come back as structured `success = false` responses;
//! protocol errors are reserved for malformed tool invocations.

use crate::types::{ExecuteParams, ExecuteResponse};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use codebox_core::{ExecuteRequest, Language, Settings};
use codebox_sandbox::SandboxExecutor;
use rmcp::handler::server::ServerHandler;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{ErrorData as McpError, tool, tool_handler, tool_router};
use std::sync::Arc;

/// MCP server for sandboxed code execution.
///
/// The service owns immutable settings and one executor; requests are
/// independent and carry no session state.
#[derive(Clone)]
pub struct CodeboxService {
    settings: Arc<Settings>,
    executor: Arc<dyn SandboxExecutor>,
    tool_router: ToolRouter<Self>,
}

impl std::fmt::Debug for CodeboxService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeboxService").finish_non_exhaustive()
    }
}

impl CodeboxService {
    /// Creates a service over an executor.
    #[must_use]
    pub fn new(settings: Arc<Settings>, executor: Arc<dyn SandboxExecutor>) -> Self {
        Self {
            settings,
            executor,
            tool_router: Self::tool_router(),
        }
    }

    async fn run_request(&self, params: ExecuteParams) -> ExecuteResponse {
        let language: Language = match params.language.parse() {
            Ok(language) => language,
            Err(e) => return ExecuteResponse::failure(e.to_string()),
        };

        let mut limits = self.settings.default_limits();
        if let Some(secs) = params.timeout_sec.filter(|s| *s > 0) {
            limits.timeout = std::time::Duration::from_secs(secs);
        }
        if let Some(memory_mb) = params.memory_mb.filter(|m| *m > 0) {
            limits.memory_mb = memory_mb;
        }
        if let Some(network) = params.network {
            limits.network_enabled = network;
        }

        let mut request = ExecuteRequest::new(language, params.code).with_limits(limits);

        if let Some(encoded) = &params.workdir_tar {
            match BASE64.decode(encoded) {
                Ok(archive) => request = request.with_workdir_archive(archive),
                Err(e) => {
                    return ExecuteResponse::failure(format!("invalid workdir_tar base64: {e}"));
                }
            }
        }

        match self.executor.execute(request).await {
            Ok(result) => ExecuteResponse::from_result(&result),
            Err(e) => {
                tracing::warn!(%language, error = %e, "execution failed");
                ExecuteResponse::failure(e.to_string())
            }
        }
    }
}

#[tool_router]
impl CodeboxService {
    /// Execute code in an isolated sandbox.
    ///
    /// Accepts a language, source text, and an optional starting
    /// workspace; returns captured output, the exit code, and an
    /// archive of whatever the code left behind.
    #[tool(
        description = "Execute code in a sandboxed environment. Supports python, nodejs, go, and cpp. Accepts an optional base64 tar.gz working directory and returns stdout, stderr, the exit code, and a base64 tar.gz of produced artifacts."
    )]
    async fn execute_sandboxed_code(
        &self,
        Parameters(params): Parameters<ExecuteParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self.run_request(params).await;
        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&response).map_err(|e| {
                McpError::internal_error(format!("Failed to serialize result: {e}"), None)
            })?,
        )]))
    }
}

#[tool_handler]
impl ServerHandler for CodeboxService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Run code in an isolated sandbox with execute_sandboxed_code. \
                 Provide the language and source text; optionally seed the \
                 working directory with a base64 tar.gz archive."
                    .to_string(),
            ),
        }
    }
}
