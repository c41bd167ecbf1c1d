//! Email service for delivering one-time passcodes.
//!
//! Delivery is bounded by `email.send_timeout`. A transport that times out
//! or errors reports [`DeliveryStatus::Uncertain`] rather than failing the
//! signup: the account and challenge are already committed, and the user can
//! request a resend.

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;
use std::time::Duration;

use crate::{config::Config, errors::Error};

/// Whether the passcode email is known to have left the building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    /// The transport failed or timed out; the code is still live in the store
    Uncertain,
}

pub struct OtpMailer {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
    send_timeout: Duration,
    /// Outside production, uncertain deliveries also log the code so local
    /// flows are testable without a mailbox
    log_code_on_failure: bool,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl OtpMailer {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            crate::config::EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            crate::config::EmailTransportConfig::File { path } => {
                // File transport for development/testing
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                let file_transport = AsyncFileTransport::<Tokio1Executor>::new(emails_dir);
                EmailTransport::File(file_transport)
            }
        };

        Ok(Self {
            transport,
            from_email: email_config.from_email.clone(),
            from_name: email_config.from_name.clone(),
            send_timeout: email_config.send_timeout,
            log_code_on_failure: !config.is_production(),
        })
    }

    /// Send a verification code. Never fails the calling flow: transport
    /// problems come back as `Uncertain`.
    pub async fn send_otp_email(&self, to_email: &str, code: &str, ttl_minutes: u64) -> Result<DeliveryStatus, Error> {
        let subject = "Your Savora verification code";
        let body = self.create_otp_body(code, ttl_minutes);

        let send = self.send_email(to_email, subject, &body);
        match tokio::time::timeout(self.send_timeout, send).await {
            Ok(Ok(())) => Ok(DeliveryStatus::Sent),
            Ok(Err(e)) => {
                tracing::warn!(email = %to_email, "OTP email delivery failed: {e}");
                if self.log_code_on_failure {
                    tracing::info!(email = %to_email, code = %code, "undelivered verification code");
                }
                Ok(DeliveryStatus::Uncertain)
            }
            Err(_) => {
                tracing::warn!(email = %to_email, timeout = ?self.send_timeout, "OTP email delivery timed out");
                if self.log_code_on_failure {
                    tracing::info!(email = %to_email, code = %code, "undelivered verification code");
                }
                Ok(DeliveryStatus::Uncertain)
            }
        }
    }

    async fn send_email(&self, to_email: &str, subject: &str, body: &str) -> Result<(), Error> {
        let from = format!("{} <{}>", self.from_name, self.from_email)
            .parse::<Mailbox>()
            .map_err(|e| Error::Internal {
                operation: format!("parse from email: {e}"),
            })?;

        let to = to_email.parse::<Mailbox>().map_err(|e| Error::Internal {
            operation: format!("parse to email: {e}"),
        })?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        Ok(())
    }

    fn create_otp_body(&self, code: &str, ttl_minutes: u64) -> String {
        format!(
            r#"<html>
<body style="font-family: sans-serif; color: #333;">
    <h2>Verify your email</h2>
    <p>Enter this code to finish setting up your Savora account:</p>
    <p style="font-size: 32px; letter-spacing: 8px; font-weight: bold;">{code}</p>
    <p>The code expires in {ttl_minutes} minutes and can only be used once.</p>
    <p>If you didn't request this, you can safely ignore this email.</p>
</body>
</html>"#
        )
    }
}
