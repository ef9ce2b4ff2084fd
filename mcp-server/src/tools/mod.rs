//! Tool registry and dispatch for the packrun MCP server.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use mcp_types::CallToolResult;
use mcp_types::Tool;
use packrun_core::BackgroundTaskManager;
use serde::de::DeserializeOwned;
use serde_json::Value;

mod project_tools;
mod spec;
mod task_tools;

/// State shared by every tool invocation.
pub(crate) struct ToolSession {
    pub manager: Arc<BackgroundTaskManager>,
    pub default_root: PathBuf,
}

/// Failure rendered to the client as a tool error (`isError: true`).
#[derive(Debug)]
pub(crate) struct ToolCallError(pub String);

pub(crate) type ToolResult = Result<CallToolResult, ToolCallError>;

#[async_trait]
pub(crate) trait ToolHandler: Send + Sync {
    async fn handle(
        &self,
        session: Arc<ToolSession>,
        tool_name: &str,
        arguments: Option<Value>,
    ) -> ToolResult;
}

pub(crate) struct ToolRouter {
    handlers: HashMap<&'static str, Arc<dyn ToolHandler>>,
}

impl ToolRouter {
    pub(crate) fn new() -> Self {
        let project: Arc<dyn ToolHandler> = Arc::new(project_tools::ProjectToolHandler);
        let task: Arc<dyn ToolHandler> = Arc::new(task_tools::TaskToolHandler);

        let mut handlers: HashMap<&'static str, Arc<dyn ToolHandler>> = HashMap::new();
        for name in [
            "run_tests",
            "build_project",
            "install_dependencies",
            "run_script",
        ] {
            handlers.insert(name, Arc::clone(&project));
        }
        for name in ["list_tasks", "task_output", "stop_task"] {
            handlers.insert(name, Arc::clone(&task));
        }
        Self { handlers }
    }

    pub(crate) fn tool_specs(&self) -> Vec<Tool> {
        spec::all_tools()
    }

    pub(crate) async fn dispatch(
        &self,
        name: &str,
        arguments: Option<Value>,
        session: Arc<ToolSession>,
    ) -> CallToolResult {
        let Some(handler) = self.handlers.get(name) else {
            return CallToolResult::error(format!("unknown tool: {name}"));
        };
        match handler.handle(session, name, arguments).await {
            Ok(result) => result,
            Err(ToolCallError(message)) => CallToolResult::error(message),
        }
    }
}

/// Missing arguments deserialize as an empty object so tools with all-optional
/// parameters can be called bare.
pub(crate) fn parse_arguments<T: DeserializeOwned>(
    tool: &str,
    arguments: Option<Value>,
) -> Result<T, ToolCallError> {
    let value = arguments.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    serde_json::from_value(value)
        .map_err(|err| ToolCallError(format!("failed to parse {tool} arguments: {err}")))
}
