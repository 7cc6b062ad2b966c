use std::str::FromStr;

use lettre::message::Mailbox;
use thiserror::Error;

pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Port on which the relay expects TLS from the first byte instead of STARTTLS.
pub const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} env var not set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: Mailbox,
    pub accept_invalid_certs: bool,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from.to_string())
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

impl SmtpConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let host = required("EMAIL_SMTP_HOST")?;
        let username = required("EMAIL_SMTP_USER")?;
        let password = required("EMAIL_SMTP_PASSWORD")?;
        let from = required("EMAIL_FROM")?;
        let from = Mailbox::from_str(from.trim()).map_err(|e| ConfigError::Invalid {
            key: "EMAIL_FROM",
            reason: e.to_string(),
        })?;

        let port = match lookup("EMAIL_SMTP_PORT") {
            Some(port) => port.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: "EMAIL_SMTP_PORT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_SMTP_PORT,
        };

        let accept_invalid_certs = match lookup("EMAIL_SMTP_ACCEPT_INVALID_CERTS") {
            Some(flag) => parse_flag(&flag).ok_or_else(|| ConfigError::Invalid {
                key: "EMAIL_SMTP_ACCEPT_INVALID_CERTS",
                reason: format!("expected true or false, got {:?}", flag),
            })?,
            None => false,
        };

        Ok(Self {
            host: host.trim().to_string(),
            port,
            username,
            password,
            from,
            accept_invalid_certs,
        })
    }

    pub fn implicit_tls(&self) -> bool {
        self.port == IMPLICIT_TLS_PORT
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
