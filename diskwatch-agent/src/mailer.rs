//! SMTP delivery of the alert mail
//!
//! One plain-text message, sent from the notification account through an
//! authenticated STARTTLS relay.

use crate::config::MailConfig;
use async_trait::async_trait;
use diskwatch_core::notifier::{Notifier, NotifyError};
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &MailConfig) -> Result<Self, NotifyError> {
        let from = parse_mailbox(&config.username)?;
        let to = parse_mailbox(config.recipient())?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { mailer, from, to })
    }

    fn compose(&self, subject: &str, body: &str) -> Result<Message, NotifyError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifyError::Message(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let email = self.compose(subject, body)?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        info!("Alert mail sent to {}", self.to);
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse().map_err(|e: lettre::address::AddressError| NotifyError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}
