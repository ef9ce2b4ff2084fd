use std::sync::Arc;

use mcp_types::CallToolRequestParams;
use mcp_types::Implementation;
use mcp_types::InitializeResult;
use mcp_types::INVALID_PARAMS_ERROR_CODE;
use mcp_types::JSONRPCNotification;
use mcp_types::JSONRPCRequest;
use mcp_types::ListToolsResult;
use mcp_types::MCP_SCHEMA_VERSION;
use mcp_types::METHOD_NOT_FOUND_ERROR_CODE;
use mcp_types::ServerCapabilities;
use mcp_types::ServerCapabilitiesTools;
use serde_json::json;
use tracing::debug;

use crate::outgoing_message::OutgoingMessageSender;
use crate::tools::ToolRouter;
use crate::tools::ToolSession;

pub(crate) struct MessageProcessor {
    outgoing: OutgoingMessageSender,
    session: Arc<ToolSession>,
    router: Arc<ToolRouter>,
}

impl MessageProcessor {
    pub(crate) fn new(outgoing: OutgoingMessageSender, session: Arc<ToolSession>) -> Self {
        Self {
            outgoing,
            session,
            router: Arc::new(ToolRouter::new()),
        }
    }

    pub(crate) async fn process_request(&mut self, request: JSONRPCRequest) {
        let JSONRPCRequest {
            id, method, params, ..
        } = request;

        match method.as_str() {
            "initialize" => {
                let result = InitializeResult {
                    protocol_version: MCP_SCHEMA_VERSION.to_string(),
                    capabilities: ServerCapabilities {
                        tools: Some(ServerCapabilitiesTools { list_changed: None }),
                    },
                    server_info: Implementation {
                        name: "packrun".to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                    instructions: Some(
                        "Package-manager tools for the active JS/TS project. Long-running \
                         scripts (dev servers, watchers) are detached automatically; inspect \
                         them with list_tasks/task_output and stop them with stop_task."
                            .to_string(),
                    ),
                };
                self.outgoing.send_response(id, result);
            }
            "ping" => {
                self.outgoing.send_response(id, json!({}));
            }
            "tools/list" => {
                let result = ListToolsResult {
                    tools: self.router.tool_specs(),
                };
                self.outgoing.send_response(id, result);
            }
            "tools/call" => {
                let params = match params
                    .ok_or_else(|| "missing params".to_string())
                    .and_then(|value| {
                        serde_json::from_value::<CallToolRequestParams>(value)
                            .map_err(|err| err.to_string())
                    }) {
                    Ok(params) => params,
                    Err(err) => {
                        self.outgoing.send_error(
                            id,
                            INVALID_PARAMS_ERROR_CODE,
                            format!("invalid tools/call params: {err}"),
                        );
                        return;
                    }
                };

                // Tool calls can run for tens of seconds (installs, test
                // suites, the background startup window); dispatch each on
                // its own task so the message loop keeps draining.
                let router = Arc::clone(&self.router);
                let session = Arc::clone(&self.session);
                let outgoing = self.outgoing.clone();
                tokio::spawn(async move {
                    let result = router
                        .dispatch(&params.name, params.arguments, session)
                        .await;
                    outgoing.send_response(id, result);
                });
            }
            other => {
                debug!("unsupported method: {other}");
                self.outgoing.send_error(
                    id,
                    METHOD_NOT_FOUND_ERROR_CODE,
                    format!("method not supported: {other}"),
                );
            }
        }
    }

    pub(crate) fn process_notification(&self, notification: JSONRPCNotification) {
        debug!("notification: {}", notification.method);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use mcp_types::RequestId;
    use packrun_core::BackgroundTaskManager;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    use super::*;
    use crate::outgoing_message::OutgoingMessage;

    fn processor() -> (MessageProcessor, mpsc::UnboundedReceiver<OutgoingMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(ToolSession {
            manager: Arc::new(BackgroundTaskManager::new()),
            default_root: PathBuf::from("."),
        });
        (
            MessageProcessor::new(OutgoingMessageSender::new(tx), session),
            rx,
        )
    }

    fn request(method: &str, params: Option<serde_json::Value>) -> JSONRPCRequest {
        JSONRPCRequest {
            jsonrpc: mcp_types::JSONRPC_VERSION.to_string(),
            id: RequestId::Integer(1),
            method: method.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn initialize_reports_tool_capabilities() {
        let (mut processor, mut rx) = processor();
        processor.process_request(request("initialize", None)).await;

        let OutgoingMessage::Response(response) = rx.recv().await.expect("response") else {
            panic!("expected a response");
        };
        assert_eq!(response.result["protocolVersion"], MCP_SCHEMA_VERSION);
        assert_eq!(response.result["serverInfo"]["name"], "packrun");
        assert!(response.result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn tools_list_exposes_all_tools() {
        let (mut processor, mut rx) = processor();
        processor.process_request(request("tools/list", None)).await;

        let OutgoingMessage::Response(response) = rx.recv().await.expect("response") else {
            panic!("expected a response");
        };
        let tools = response.result["tools"].as_array().expect("tools array");
        assert_eq!(tools.len(), 7);
    }

    #[tokio::test]
    async fn unknown_method_is_rejected() {
        let (mut processor, mut rx) = processor();
        processor
            .process_request(request("resources/list", None))
            .await;

        let OutgoingMessage::Error(err) = rx.recv().await.expect("error") else {
            panic!("expected an error");
        };
        assert_eq!(err.error.code, METHOD_NOT_FOUND_ERROR_CODE);
    }

    #[tokio::test]
    async fn unknown_tool_call_reports_tool_error() {
        let (mut processor, mut rx) = processor();
        processor
            .process_request(request(
                "tools/call",
                Some(serde_json::json!({"name": "no_such_tool"})),
            ))
            .await;

        let OutgoingMessage::Response(response) = rx.recv().await.expect("response") else {
            panic!("expected a response");
        };
        assert_eq!(response.result["isError"], true);
    }
}
