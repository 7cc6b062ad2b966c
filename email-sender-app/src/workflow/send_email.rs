use std::sync::Arc;

use crate::{
    domain::{EmailAddress, EmailRequest},
    ports::mail::{DeliveryFailure, DeliveryReceipt, MailTransportPort, OutgoingEmail},
};

#[async_trait::async_trait]
pub trait SendEmailUseCase {
    async fn send_email(&self, request: EmailRequest) -> SendEmailOutcome;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendEmailOutcome {
    Delivered {
        to: EmailAddress,
        receipt: DeliveryReceipt,
    },
    Failed {
        to: EmailAddress,
        failure: DeliveryFailure,
    },
}

pub struct SendEmailUseCaseImpl<M: MailTransportPort> {
    mail_transport: Arc<M>,
}

impl<M: MailTransportPort> SendEmailUseCaseImpl<M> {
    pub fn new(mail_transport: Arc<M>) -> Self {
        Self { mail_transport }
    }
}

#[async_trait::async_trait]
impl<M: MailTransportPort + Send + Sync + 'static> SendEmailUseCase for SendEmailUseCaseImpl<M> {
    async fn send_email(&self, request: EmailRequest) -> SendEmailOutcome {
        let EmailRequest { to, subject, text } = request;
        log::info!("Sending email to {}", to);

        let email = OutgoingEmail {
            to: to.clone(),
            subject,
            text,
        };
        match self.mail_transport.deliver(&email).await {
            Ok(receipt) => {
                log::info!("Email sent to {}: {}", to, receipt);
                SendEmailOutcome::Delivered { to, receipt }
            }
            Err(failure) => {
                log::error!("Failed to send email to {}: {}", to, failure);
                SendEmailOutcome::Failed { to, failure }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct MockMailTransport {
        fail_with: Option<String>,
        sent: Mutex<Vec<OutgoingEmail>>,
    }

    impl MockMailTransport {
        fn failing(message: &str) -> Self {
            Self {
                fail_with: Some(message.to_string()),
                ..Default::default()
            }
        }

        fn get_sent(&self) -> Vec<OutgoingEmail> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl MailTransportPort for MockMailTransport {
        async fn deliver(
            &self,
            email: &OutgoingEmail,
        ) -> Result<DeliveryReceipt, DeliveryFailure> {
            self.sent.lock().unwrap().push(email.clone());
            match &self.fail_with {
                Some(message) => Err(DeliveryFailure::Transport(message.clone())),
                None => Ok(DeliveryReceipt {
                    response: "250 Ok".to_string(),
                }),
            }
        }
    }

    fn request(to: &str, subject: &str, text: &str) -> EmailRequest {
        EmailRequest::new(EmailAddress::parse(to).unwrap(), subject, text)
    }

    #[tokio::test]
    async fn test_send_email_delivered() {
        let transport = Arc::new(MockMailTransport::default());
        let use_case = SendEmailUseCaseImpl::new(transport.clone());

        let outcome = use_case
            .send_email(request("a@example.com", "Hi", "Hello"))
            .await;

        assert!(matches!(
            &outcome,
            SendEmailOutcome::Delivered { to, receipt }
                if to.as_str() == "a@example.com" && receipt.response == "250 Ok"
        ));
        let sent = transport.get_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to.as_str(), "a@example.com");
        assert_eq!(sent[0].subject, "Hi");
        assert_eq!(sent[0].text, "Hello");
    }

    #[tokio::test]
    async fn test_send_email_failure_is_returned_not_raised() {
        let transport = Arc::new(MockMailTransport::failing("535 Authentication failed"));
        let use_case = SendEmailUseCaseImpl::new(transport.clone());

        let outcome = use_case
            .send_email(request("a@example.com", "Hi", "Hello"))
            .await;

        assert_eq!(
            outcome,
            SendEmailOutcome::Failed {
                to: EmailAddress::parse("a@example.com").unwrap(),
                failure: DeliveryFailure::Transport("535 Authentication failed".to_string()),
            }
        );
        assert_eq!(transport.get_sent().len(), 1);
    }

    #[tokio::test]
    async fn test_send_email_twice_delivers_twice() {
        let transport = Arc::new(MockMailTransport::default());
        let use_case = SendEmailUseCaseImpl::new(transport.clone());

        for _ in 0..2 {
            use_case
                .send_email(request("a@example.com", "Hi", "Hello"))
                .await;
        }

        assert_eq!(transport.get_sent().len(), 2);
    }

    #[tokio::test]
    async fn test_send_email_passes_content_through_unchanged() {
        let transport = Arc::new(MockMailTransport::default());
        let use_case = SendEmailUseCaseImpl::new(transport.clone());

        use_case
            .send_email(request("a@example.com", "", "line\r\n\u{7}bell"))
            .await;

        let sent = transport.get_sent();
        assert_eq!(sent[0].subject, "");
        assert_eq!(sent[0].text, "line\r\n\u{7}bell");
    }
}
