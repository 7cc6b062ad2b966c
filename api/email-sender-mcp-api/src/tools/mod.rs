use std::{collections::BTreeMap, sync::Arc};

use serde_json::Value;

use crate::protocol::{CallToolResult, ProtocolError, ToolDefinition};

pub mod send_email;

pub type ArcTool = Arc<dyn Tool + Send + Sync + 'static>;

#[async_trait::async_trait]
pub trait Tool {
    fn definition(&self) -> ToolDefinition;
    /// Arguments that fail the input schema must be rejected with
    /// `ProtocolError::InvalidParams` before any side effect.
    async fn call(&self, arguments: Value) -> Result<CallToolResult, ProtocolError>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ArcTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: ArcTool) {
        let name = tool.definition().name;
        log::info!("Registered tool: {}", name);
        if self.tools.insert(name.clone(), tool).is_some() {
            log::warn!("Tool {} was registered twice, keeping the latest", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<ArcTool> {
        self.tools.get(name).cloned()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    pub async fn call(&self, name: &str, arguments: Value) -> Result<CallToolResult, ProtocolError> {
        let Some(tool) = self.get(name) else {
            return Err(ProtocolError::InvalidParams(format!("Tool {} not found", name)));
        };
        tool.call(arguments).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct EchoTool(&'static str);

    #[async_trait::async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.0.to_string(),
                description: "Echoes its arguments".to_string(),
                input_schema: json!({"type": "object"}),
            }
        }

        async fn call(&self, arguments: Value) -> Result<CallToolResult, ProtocolError> {
            Ok(CallToolResult::text(arguments.to_string()))
        }
    }

    #[test]
    fn test_definitions_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool("zeta")));
        registry.register(Arc::new(EchoTool("alpha")));

        let names: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_call_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool("echo")));

        let result = registry.call("echo", json!({"a": 1})).await.unwrap();
        assert_eq!(result, CallToolResult::text(r#"{"a":1}"#));
    }

    #[tokio::test]
    async fn test_call_unknown_tool() {
        let registry = ToolRegistry::new();
        let result = registry.call("missing", json!({})).await;
        assert!(matches!(result, Err(ProtocolError::InvalidParams(msg)) if msg.contains("missing")));
    }
}
