use thiserror::Error;

use crate::domain::EmailAddress;

/// The message handed to the transport. The sender is owned by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: EmailAddress,
    pub subject: String,
    pub text: String,
}

/// Final reply of the mail server for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub response: String,
}

impl std::fmt::Display for DeliveryReceipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.response)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryFailure {
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("{0}")]
    Transport(String),
}

#[async_trait::async_trait]
pub trait MailTransportPort {
    /// Makes exactly one delivery attempt.
    async fn deliver(&self, email: &OutgoingEmail) -> Result<DeliveryReceipt, DeliveryFailure>;
}
