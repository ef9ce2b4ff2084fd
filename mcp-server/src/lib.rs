//! MCP server for packrun: newline-delimited JSON-RPC over stdio.
#![deny(clippy::print_stdout, clippy::print_stderr)]

use std::io::Result as IoResult;
use std::path::PathBuf;
use std::sync::Arc;

use mcp_types::JSONRPCMessage;
use packrun_core::BackgroundTaskManager;
use packrun_core::shutdown::spawn_signal_listener;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::io::{self};
use tokio::sync::mpsc;
use tracing::debug;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod message_processor;
mod outgoing_message;
mod tools;

use crate::message_processor::MessageProcessor;
use crate::outgoing_message::OutgoingMessage;
use crate::outgoing_message::OutgoingMessageSender;
use crate::tools::ToolSession;

/// Size of the bounded channel between the stdin reader and the processor.
const CHANNEL_CAPACITY: usize = 128;

pub async fn run_main(project_root: Option<PathBuf>) -> IoResult<()> {
    // Stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let default_root = match project_root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    let (incoming_tx, mut incoming_rx) = mpsc::channel::<JSONRPCMessage>(CHANNEL_CAPACITY);
    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<OutgoingMessage>();

    let manager = Arc::new(BackgroundTaskManager::new());
    let shutdown_handle = spawn_signal_listener(Arc::clone(&manager));

    let stdin_handle = tokio::spawn(async move {
        let stdin = io::stdin();
        let reader = BufReader::new(stdin);
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await.unwrap_or_default() {
            match serde_json::from_str::<JSONRPCMessage>(&line) {
                Ok(msg) => {
                    if incoming_tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(err) => error!("failed to deserialize JSON-RPC message: {err}"),
            }
        }

        debug!("stdin reader finished (EOF)");
    });

    let stdout_handle = tokio::spawn(async move {
        let mut stdout = io::stdout();
        while let Some(outgoing) = outgoing_rx.recv().await {
            match serde_json::to_string(&outgoing.into_message()) {
                Ok(json) => {
                    if let Err(err) = stdout.write_all(json.as_bytes()).await {
                        error!("failed to write to stdout: {err}");
                        break;
                    }
                    if let Err(err) = stdout.write_all(b"\n").await {
                        error!("failed to write newline to stdout: {err}");
                        break;
                    }
                    if let Err(err) = stdout.flush().await {
                        error!("failed to flush stdout: {err}");
                        break;
                    }
                }
                Err(err) => error!("failed to serialize JSON-RPC message: {err}"),
            }
        }
        debug!("stdout writer exited (channel closed)");
    });

    let processor_handle = tokio::spawn({
        let session = Arc::new(ToolSession {
            manager,
            default_root,
        });
        let outgoing = OutgoingMessageSender::new(outgoing_tx);
        let mut processor = MessageProcessor::new(outgoing, session);
        async move {
            while let Some(msg) = incoming_rx.recv().await {
                match msg {
                    JSONRPCMessage::Request(request) => processor.process_request(request).await,
                    JSONRPCMessage::Notification(notification) => {
                        processor.process_notification(notification);
                    }
                    JSONRPCMessage::Response(_) | JSONRPCMessage::Error(_) => {
                        debug!("ignoring client-originated response/error message");
                    }
                }
            }
            debug!("processor task exited (channel closed)");
        }
    });

    let _ = stdin_handle.await;
    let _ = processor_handle.await;
    let _ = stdout_handle.await;
    shutdown_handle.abort();

    Ok(())
}
