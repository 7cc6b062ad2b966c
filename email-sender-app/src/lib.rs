use std::sync::Arc;

use crate::{
    ports::mail::MailTransportPort,
    workflow::send_email::{SendEmailUseCase, SendEmailUseCaseImpl},
};

pub mod domain;
pub mod ports;
pub mod workflow;

pub struct Application {
    pub send_email_use_case: Box<dyn SendEmailUseCase + Send + Sync + 'static>,
}

pub fn build_application<M: MailTransportPort + Send + Sync + 'static>(
    mail_transport: Arc<M>,
) -> Application {
    let send_email_use_case = Box::new(SendEmailUseCaseImpl::new(mail_transport));

    Application {
        send_email_use_case,
    }
}
