use std::str::FromStr;

use email_sender_app::ports::mail::{
    DeliveryFailure, DeliveryReceipt, MailTransportPort, OutgoingEmail,
};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
        response::Response,
    },
};

pub mod config;

pub use config::{ConfigError, SmtpConfig};

pub struct LettreMailTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl LettreMailTransport {
    pub fn new(config: SmtpConfig) -> Result<Self, lettre::transport::smtp::Error> {
        let tls_parameters = TlsParameters::builder(config.host.clone())
            .dangerous_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        let tls = if config.implicit_tls() {
            Tls::Wrapper(tls_parameters)
        } else {
            Tls::Required(tls_parameters)
        };

        log::info!(
            "SMTP relay {}:{} ({}), sending as {}",
            config.host,
            config.port,
            if config.implicit_tls() {
                "implicit TLS"
            } else {
                "STARTTLS"
            },
            config.from
        );
        if config.accept_invalid_certs {
            log::warn!("SMTP certificate verification is disabled");
        }

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host)
            .port(config.port)
            .tls(tls)
            .credentials(Credentials::new(config.username, config.password))
            .build();

        Ok(Self {
            transport,
            from: config.from,
        })
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message, DeliveryFailure> {
        let to = Mailbox::from_str(email.to.as_str())
            .map_err(|e| DeliveryFailure::InvalidMessage(format!("Invalid to address: {}", e)))?;
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.text.clone())
            .map_err(|e| DeliveryFailure::InvalidMessage(format!("Failed to build email: {}", e)))
    }
}

fn describe_response(response: &Response) -> String {
    let lines = response.message().collect::<Vec<_>>().join(" ");
    format!("{} {}", response.code(), lines).trim_end().to_string()
}

#[async_trait::async_trait]
impl MailTransportPort for LettreMailTransport {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<DeliveryReceipt, DeliveryFailure> {
        let message = self.build_message(email)?;
        log::debug!(
            "Submitting message to {} ({} bytes)",
            email.to,
            message.formatted().len()
        );
        match self.transport.send(message).await {
            Ok(response) => {
                let response = describe_response(&response);
                log::debug!("SMTP session for {} ended with {}", email.to, response);
                Ok(DeliveryReceipt { response })
            }
            Err(e) => {
                log::debug!("SMTP session for {} failed: {:?}", email.to, e);
                Err(DeliveryFailure::Transport(e.to_string()))
            }
        }
    }
}
