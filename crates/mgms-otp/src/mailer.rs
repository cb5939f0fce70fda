//! Out-of-band delivery of one-time codes.
//!
//! The [`Mailer`] trait is the seam between the lifecycle manager and the
//! mail transport; [`SmtpMailer`] is the lettre-backed production
//! implementation. Tests substitute their own recorders.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use mgms_core::SmtpConfig;

use crate::purpose::OtpPurpose;

/// Errors from building or sending a code mail.
#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("invalid mail address: {0}")]
    Address(String),

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),
}

/// Delivers a one-time code to an email address through an out-of-band
/// channel.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_code(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<(), MailerError>;
}

/// SMTP-backed [`Mailer`] using lettre's async transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Build a mailer from SMTP settings.
    pub fn from_config(config: &SmtpConfig) -> Result<Self, MailerError> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| MailerError::Transport(e.to_string()))?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }

    fn build_message(&self, email: &str, code: &str, purpose: OtpPurpose) -> Result<Message, MailerError> {
        let (subject, title) = subject_and_title(purpose);
        let body = format!(
            "<h2>{title}</h2>\n\
             <p>Your OTP code is: <strong>{code}</strong></p>\n\
             <p>This code will expire in 10 minutes.</p>\n\
             <p>If you did not request this, please ignore this email.</p>"
        );

        let from = self
            .from_address
            .parse::<Mailbox>()
            .map_err(|e| MailerError::Address(format!("{}: {e}", self.from_address)))?;
        let to = email
            .parse::<Mailbox>()
            .map_err(|e| MailerError::Address(format!("{email}: {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body)
            .map_err(|e| MailerError::Message(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_code(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<(), MailerError> {
        let message = self.build_message(email, code, purpose)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| MailerError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Subject line and heading, scoped to the flow the code belongs to.
const fn subject_and_title(purpose: OtpPurpose) -> (&'static str, &'static str) {
    match purpose {
        OtpPurpose::Verification => ("Email Verification OTP", "Email Verification"),
        OtpPurpose::PasswordReset => ("Password Reset OTP", "Password Reset"),
    }
}
