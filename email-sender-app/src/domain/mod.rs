pub mod email;

pub use email::{EmailAddress, EmailRequest, InvalidEmailAddress};
