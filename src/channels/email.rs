//! Email delivery: sends the composed newsletter over SMTP via lettre.

use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

use crate::config::MailConfig;
use crate::error::{Error, TransportError, ValidationError};

const SERVICE: &str = "smtp";

fn send_failed(reason: String) -> TransportError {
    TransportError::SendFailed {
        service: SERVICE.into(),
        reason,
    }
}

/// SMTP mailer for newsletter delivery.
#[derive(Debug, Clone)]
pub struct Mailer {
    config: MailConfig,
}

impl Mailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    pub fn recipients(&self) -> &[String] {
        &self.config.recipients
    }

    /// Build the message for every configured recipient.
    ///
    /// Fails with a validation error when no recipients are configured,
    /// before any connection is made.
    pub fn build_message(&self, subject: &str, body: &str) -> Result<Message, Error> {
        if self.config.recipients.is_empty() {
            return Err(ValidationError::MissingField("recipients").into());
        }

        let from = self
            .config
            .from_address
            .parse()
            .map_err(|e| send_failed(format!("Invalid from address: {e}")))?;

        let mut builder = Message::builder().from(from).subject(subject);
        for to in &self.config.recipients {
            builder = builder.to(to
                .parse()
                .map_err(|e| send_failed(format!("Invalid to address {to}: {e}")))?);
        }

        Ok(builder
            .body(body.to_string())
            .map_err(|e| send_failed(format!("Failed to build email: {e}")))?)
    }

    /// Open and close an SMTP session without sending anything.
    pub async fn check_connection(&self) -> Result<(), Error> {
        if self.config.smtp_host.trim().is_empty() {
            return Err(ValidationError::MissingField("smtp_host").into());
        }
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || check_blocking(&config))
            .await
            .map_err(|e| send_failed(format!("Mail task failed: {e}")))??;

        tracing::debug!(host = %self.config.smtp_host, "SMTP connection verified");
        Ok(())
    }

    /// Send the newsletter. SMTP runs on a blocking task.
    pub async fn send_newsletter(&self, subject: &str, body: &str) -> Result<(), Error> {
        let email = self.build_message(subject, body)?;
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || send_blocking(&config, &email))
            .await
            .map_err(|e| send_failed(format!("Mail task failed: {e}")))??;

        tracing::info!(
            recipients = self.config.recipients.len(),
            subject,
            "Newsletter emailed"
        );
        Ok(())
    }
}

fn transport(config: &MailConfig) -> Result<SmtpTransport, TransportError> {
    let creds = Credentials::new(
        config.username.clone(),
        config.password.expose_secret().to_string(),
    );

    Ok(SmtpTransport::relay(&config.smtp_host)
        .map_err(|e| send_failed(format!("SMTP relay error: {e}")))?
        .port(config.smtp_port)
        .credentials(creds)
        .build())
}

fn check_blocking(config: &MailConfig) -> Result<(), TransportError> {
    let connected = transport(config)?.test_connection().map_err(|e| {
        TransportError::Unreachable {
            service: SERVICE.into(),
            reason: e.to_string(),
        }
    })?;
    if !connected {
        return Err(TransportError::Unreachable {
            service: SERVICE.into(),
            reason: format!("{} did not accept the connection", config.smtp_host),
        });
    }
    Ok(())
}

fn send_blocking(config: &MailConfig, email: &Message) -> Result<(), TransportError> {
    transport(config)?.send(email).map_err(|e| {
        tracing::error!(host = %config.smtp_host, error = %e, "SMTP send failed");
        send_failed(format!("SMTP send failed: {e}"))
    })?;
    Ok(())
}
