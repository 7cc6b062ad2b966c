use std::{future::Future, sync::Arc};

use serde_json::{Value, json};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
};
use tokio_util::task::TaskTracker;

use crate::{
    protocol::{
        CallToolParams, InitializeParams, InitializeResult, JSONRPC_VERSION, JsonRpcMessage,
        JsonRpcResponse, ListToolsResult, ProtocolError, ServerInfo, negotiate_protocol_version,
    },
    tools::ToolRegistry,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("stdio error: {0}")]
    Io(#[from] std::io::Error),
    #[error("response writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub struct McpServer {
    info: ServerInfo,
    registry: ToolRegistry,
}

impl McpServer {
    pub fn new(info: ServerInfo, registry: ToolRegistry) -> Self {
        Self { info, registry }
    }

    /// Raw line from the wire. Input that is not UTF-8 gets a parse error
    /// reply, like any other unparsable message.
    pub async fn handle_bytes(&self, bytes: &[u8]) -> Option<JsonRpcResponse> {
        match std::str::from_utf8(bytes) {
            Ok(line) => self.handle_line(line).await,
            Err(e) => {
                log::warn!("Received a line that is not valid UTF-8: {}", e);
                let error = ProtocolError::Parse(format!("invalid UTF-8: {}", e));
                Some(JsonRpcResponse::failure(Value::Null, &error))
            }
        }
    }

    fn spawn_line(
        self: &Arc<Self>,
        tracker: &TaskTracker,
        tx: &UnboundedSender<String>,
        bytes: Vec<u8>,
    ) {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return;
        }
        let server = self.clone();
        let tx = tx.clone();
        tracker.spawn(async move {
            if let Some(response) = server.handle_bytes(&bytes).await {
                send_response(&tx, &response);
            }
        });
    }

    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let message = match serde_json::from_str::<JsonRpcMessage>(line) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Failed to parse JSON-RPC message: {}", e);
                let error = if e.is_syntax() || e.is_eof() {
                    ProtocolError::Parse(e.to_string())
                } else {
                    ProtocolError::InvalidRequest(e.to_string())
                };
                return Some(JsonRpcResponse::failure(Value::Null, &error));
            }
        };

        if message.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
            let error = ProtocolError::InvalidRequest("jsonrpc must be \"2.0\"".to_string());
            return Some(JsonRpcResponse::failure(
                message.id.unwrap_or(Value::Null),
                &error,
            ));
        }

        if message.is_response() {
            log::debug!("Ignoring unexpected response with id {:?}", message.id);
            return None;
        }

        let Some(method) = message.method else {
            let error = ProtocolError::InvalidRequest("missing method".to_string());
            return Some(JsonRpcResponse::failure(
                message.id.unwrap_or(Value::Null),
                &error,
            ));
        };

        let Some(id) = message.id else {
            self.handle_notification(&method);
            return None;
        };

        log::debug!("Request {} {}", id, method);
        let response = match self.dispatch(&method, message.params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                log::warn!("Request {} {} failed: {}", id, method, e);
                JsonRpcResponse::failure(id, &e)
            }
        };
        Some(response)
    }

    fn handle_notification(&self, method: &str) {
        match method {
            "notifications/initialized" => log::info!("Client finished initialization"),
            "notifications/cancelled" => {
                log::debug!("Ignoring cancellation, send attempts always run to completion")
            }
            _ => log::debug!("Ignoring notification {}", method),
        }
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value, ProtocolError> {
        match method {
            "initialize" => {
                let params = match params {
                    Some(params) => serde_json::from_value::<InitializeParams>(params)
                        .map_err(|e| ProtocolError::InvalidParams(e.to_string()))?,
                    None => InitializeParams::default(),
                };
                if let Some(client) = &params.client_info {
                    log::info!("Client connected: {} {}", client.name, client.version);
                }
                let result = InitializeResult {
                    protocol_version: negotiate_protocol_version(
                        params.protocol_version.as_deref(),
                    )
                    .to_string(),
                    capabilities: json!({"tools": {"listChanged": false}}),
                    server_info: self.info.clone(),
                };
                Ok(serde_json::to_value(result)?)
            }
            "ping" => Ok(json!({})),
            "tools/list" => {
                let result = ListToolsResult {
                    tools: self.registry.definitions(),
                };
                Ok(serde_json::to_value(result)?)
            }
            "tools/call" => {
                let params = params
                    .ok_or_else(|| ProtocolError::InvalidParams("missing params".to_string()))?;
                let params = serde_json::from_value::<CallToolParams>(params)
                    .map_err(|e| ProtocolError::InvalidParams(e.to_string()))?;
                let arguments = params.arguments.unwrap_or_else(|| json!({}));
                let result = self.registry.call(&params.name, arguments).await?;
                Ok(serde_json::to_value(result)?)
            }
            _ => Err(ProtocolError::MethodNotFound(method.to_string())),
        }
    }

    /// Serves newline-delimited JSON-RPC until `reader` hits EOF or `shutdown`
    /// resolves. Requests run concurrently; in-flight ones finish before this
    /// returns.
    pub async fn run<R, W, S>(
        self: Arc<Self>,
        reader: R,
        writer: W,
        shutdown: S,
    ) -> Result<(), ServerError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
        S: Future<Output = ()>,
    {
        let (tx, rx) = unbounded_channel::<String>();
        let writer_task = tokio::spawn(write_responses(writer, rx));
        let tracker = TaskTracker::new();
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        tokio::pin!(shutdown);

        let read_result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Shutdown requested, no longer reading requests");
                    break Ok(());
                }
                // read_until is cancel safe: partial input stays in `buf`.
                read = reader.read_until(b'\n', &mut buf) => match read {
                    Ok(0) => {
                        self.spawn_line(&tracker, &tx, std::mem::take(&mut buf));
                        log::info!("Input stream closed");
                        break Ok(());
                    }
                    Ok(_) => self.spawn_line(&tracker, &tx, std::mem::take(&mut buf)),
                    Err(e) => break Err(ServerError::Io(e)),
                }
            }
        };

        tracker.close();
        tracker.wait().await;
        drop(tx);
        writer_task.await??;
        read_result
    }

    pub async fn run_stdio<S>(self: Arc<Self>, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()>,
    {
        self.run(tokio::io::stdin(), tokio::io::stdout(), shutdown)
            .await
    }
}

fn send_response(tx: &UnboundedSender<String>, response: &JsonRpcResponse) {
    match serde_json::to_string(response) {
        Ok(json) => {
            if tx.send(json).is_err() {
                log::error!("Response writer is gone, dropping response {}", response.id);
            }
        }
        Err(e) => log::error!("Failed to serialize response {}: {}", response.id, e),
    }
}

async fn write_responses<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut rx: UnboundedReceiver<String>,
) -> Result<(), std::io::Error> {
    while let Some(json) = rx.recv().await {
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}
