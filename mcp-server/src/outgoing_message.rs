use mcp_types::JSONRPC_VERSION;
use mcp_types::JSONRPCError;
use mcp_types::JSONRPCErrorError;
use mcp_types::JSONRPCMessage;
use mcp_types::JSONRPCResponse;
use mcp_types::RequestId;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::error;

/// Message queued for the stdout writer task.
pub(crate) enum OutgoingMessage {
    Response(JSONRPCResponse),
    Error(JSONRPCError),
}

impl OutgoingMessage {
    pub(crate) fn into_message(self) -> JSONRPCMessage {
        match self {
            OutgoingMessage::Response(response) => JSONRPCMessage::Response(response),
            OutgoingMessage::Error(err) => JSONRPCMessage::Error(err),
        }
    }
}

#[derive(Clone)]
pub(crate) struct OutgoingMessageSender {
    tx: mpsc::UnboundedSender<OutgoingMessage>,
}

impl OutgoingMessageSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<OutgoingMessage>) -> Self {
        Self { tx }
    }

    pub(crate) fn send_response(&self, id: RequestId, result: impl Serialize) {
        let result = match serde_json::to_value(result) {
            Ok(value) => value,
            Err(err) => {
                error!("failed to serialize response payload: {err}");
                return;
            }
        };
        let _ = self.tx.send(OutgoingMessage::Response(JSONRPCResponse {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result,
        }));
    }

    pub(crate) fn send_error(&self, id: RequestId, code: i64, message: impl Into<String>) {
        let _ = self.tx.send(OutgoingMessage::Error(JSONRPCError {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            error: JSONRPCErrorError {
                code,
                message: message.into(),
                data: None,
            },
        }));
    }
}
