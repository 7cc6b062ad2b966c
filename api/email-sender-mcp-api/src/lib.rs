use std::{future::Future, sync::Arc};

use email_sender_app::Application;

use crate::{
    protocol::ServerInfo,
    server::{McpServer, ServerError},
    tools::{ToolRegistry, send_email::SendEmailTool},
};

pub mod protocol;
pub mod server;
pub mod tools;

pub fn build_server(app: Arc<Application>, info: ServerInfo) -> McpServer {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SendEmailTool::new(app)));
    McpServer::new(info, registry)
}

pub async fn run(
    app: Arc<Application>,
    info: ServerInfo,
    shutdown_signal: impl Future<Output = ()>,
) -> Result<(), ServerError> {
    let server = Arc::new(build_server(app, info));
    server.run_stdio(shutdown_signal).await
}
