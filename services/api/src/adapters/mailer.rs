//! services/api/src/adapters/mailer.rs
//!
//! Implementations of the `MailService` port.
//! `SmtpMailer` delivers through an SMTP relay with lettre; `LogMailer` only
//! records the message in the log, for development without a relay.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use shop_core::ports::{MailService, OutgoingMail, PortError, PortResult};
use tracing::{info, warn};

use crate::config::SmtpConfig;

//=========================================================================================
// SMTP
//=========================================================================================

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Creates a STARTTLS relay client. No connection is made until the first send.
    pub fn new(config: &SmtpConfig, from: &str) -> PortResult<Self> {
        let from = parse_mailbox(from)?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| PortError::Unexpected(format!("Invalid SMTP relay: {}", e)))?
            .port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl MailService for SmtpMailer {
    async fn send_mail(&self, mail: OutgoingMail) -> PortResult<()> {
        let message = build_message(&self.from, &mail)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| PortError::Unexpected(format!("SMTP send failed: {}", e)))?;

        info!(to = %mail.to, subject = %mail.subject, "Email sent");
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> PortResult<Mailbox> {
    address
        .parse::<Mailbox>()
        .map_err(|_| PortError::Unexpected(format!("Invalid email address: {}", address)))
}

/// Builds a multipart message with plain-text and HTML alternatives.
fn build_message(from: &Mailbox, mail: &OutgoingMail) -> PortResult<Message> {
    Message::builder()
        .from(from.clone())
        .to(parse_mailbox(&mail.to)?)
        .subject(mail.subject.clone())
        .multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(mail.text.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(mail.html.clone()),
                ),
        )
        .map_err(|e| PortError::Unexpected(format!("Failed to build message: {}", e)))
}

//=========================================================================================
// Log only
//=========================================================================================

#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl MailService for LogMailer {
    async fn send_mail(&self, mail: OutgoingMail) -> PortResult<()> {
        warn!(
            to = %mail.to,
            subject = %mail.subject,
            body = %mail.text,
            "SMTP not configured, email logged instead of sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(to: &str) -> OutgoingMail {
        OutgoingMail {
            to: to.to_string(),
            subject: "Your OTP for Email Verification".to_string(),
            text: "Your OTP is 123456".to_string(),
            html: "<b>123456</b>".to_string(),
        }
    }

    #[test]
    fn builds_multipart_message() {
        let from = parse_mailbox("\"ModernShop\" <no-reply@modernshop.local>").unwrap();
        let message = build_message(&from, &mail("jane@x.com")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: jane@x.com"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("Your OTP is 123456"));
    }

    #[test]
    fn rejects_bad_recipient() {
        let from = parse_mailbox("no-reply@modernshop.local").unwrap();
        assert!(build_message(&from, &mail("not an address")).is_err());
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        assert!(LogMailer.send_mail(mail("jane@x.com")).await.is_ok());
    }
}
