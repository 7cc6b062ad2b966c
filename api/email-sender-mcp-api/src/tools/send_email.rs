use std::sync::Arc;

use email_sender_app::{
    Application,
    domain::{EmailAddress, EmailRequest},
    workflow::send_email::SendEmailOutcome,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    protocol::{CallToolResult, ProtocolError, ToolDefinition},
    tools::Tool,
};

pub const TOOL_NAME: &str = "send_email";

#[derive(Debug, Deserialize)]
struct SendEmailArgs {
    to: String,
    subject: String,
    text: String,
}

impl TryFrom<SendEmailArgs> for EmailRequest {
    type Error = ProtocolError;

    fn try_from(args: SendEmailArgs) -> Result<Self, Self::Error> {
        let to = EmailAddress::try_from(args.to).map_err(invalid_arguments)?;
        Ok(EmailRequest::new(to, args.subject, args.text))
    }
}

fn invalid_arguments(reason: impl std::fmt::Display) -> ProtocolError {
    ProtocolError::InvalidParams(format!(
        "Invalid arguments for tool {}: {}",
        TOOL_NAME, reason
    ))
}

pub fn outcome_message(outcome: &SendEmailOutcome) -> String {
    match outcome {
        SendEmailOutcome::Delivered { to, .. } => format!("✅ Email successfully sent to {}", to),
        SendEmailOutcome::Failed { to, failure } => {
            format!("❌ Failed to send email to {}: {}", to, failure)
        }
    }
}

pub struct SendEmailTool {
    app: Arc<Application>,
}

impl SendEmailTool {
    pub fn new(app: Arc<Application>) -> Self {
        Self { app }
    }
}

#[async_trait::async_trait]
impl Tool for SendEmailTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: TOOL_NAME.to_string(),
            description: "Send a plain-text email to a single recipient".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "to": {"type": "string", "format": "email"},
                    "subject": {"type": "string"},
                    "text": {"type": "string"}
                },
                "required": ["to", "subject", "text"],
                "$schema": "http://json-schema.org/draft-07/schema#"
            }),
        }
    }

    async fn call(&self, arguments: Value) -> Result<CallToolResult, ProtocolError> {
        let args = serde_json::from_value::<SendEmailArgs>(arguments).map_err(invalid_arguments)?;
        let request = EmailRequest::try_from(args)?;

        let outcome = self.app.send_email_use_case.send_email(request).await;
        Ok(CallToolResult::text(outcome_message(&outcome)))
    }
}
