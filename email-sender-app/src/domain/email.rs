use thiserror::Error;
use validator::Validate;

#[derive(Validate)]
struct EmailValidator {
    #[validate(email)]
    email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid email address: {0}")]
pub struct InvalidEmailAddress(pub String);

/// A syntactically valid recipient address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(email: &str) -> Result<Self, InvalidEmailAddress> {
        let validator = EmailValidator {
            email: email.to_string(),
        };
        if let Err(e) = validator.validate() {
            log::debug!("Rejected email address {:?}: {}", email, e);
            return Err(InvalidEmailAddress(validator.email));
        }
        Ok(Self(validator.email))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = InvalidEmailAddress;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailRequest {
    pub to: EmailAddress,
    pub subject: String,
    pub text: String,
}

impl EmailRequest {
    pub fn new(to: EmailAddress, subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            to,
            subject: subject.into(),
            text: text.into(),
        }
    }
}
