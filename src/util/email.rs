use crate::config::{ConfigError, EmailConfig};
use async_trait::async_trait;
use lettre::{
    message::{
        header::ContentType, Attachment, Body, Mailbox, MultiPart, SinglePart,
    },
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{error, info, instrument};

/// Email service errors
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("SMTP error: {0}")]
    SmtpError(String),

    #[error("Message building error: {0}")]
    MessageError(String),

    #[error("Address error: {0}")]
    AddressError(String),
}

impl From<ConfigError> for EmailError {
    fn from(err: ConfigError) -> Self {
        EmailError::ConfigError(err.to_string())
    }
}

/// A file attached to an outgoing email (original photo bytes).
#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Outgoing transactional email.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub reply_to: Option<String>,
    pub attachments: Vec<EmailAttachment>,
}

impl OutgoingEmail {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, html_body: String) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html_body,
            reply_to: None,
            attachments: Vec::new(),
        }
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<EmailAttachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Seam over the transactional email provider, injected into the intake
/// service so tests can observe and fail sends.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError>;
}

/// SMTP implementation of [`Mailer`] backed by lettre.
pub struct SmtpMailer {
    pub config: EmailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Create a new SMTP mailer
    #[instrument(skip(config), fields(host = %config.smtp_host, port = config.smtp_port))]
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        info!("Initializing SMTP mailer");

        config.validate().map_err(EmailError::from)?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
                .port(config.smtp_port)
                .timeout(Some(std::time::Duration::from_secs(
                    config.connection_timeout_secs,
                )));

        // Configure TLS settings
        if config.use_tls {
            let tls_parameters = TlsParameters::new(config.smtp_host.clone())
                .map_err(|e| EmailError::ConfigError(format!("TLS configuration error: {}", e)))?;

            if config.use_starttls {
                transport_builder = transport_builder.tls(Tls::Required(tls_parameters));
            } else {
                transport_builder = transport_builder.tls(Tls::Wrapper(tls_parameters));
            }
        } else {
            transport_builder = transport_builder.tls(Tls::None);
        }

        if !config.smtp_username.is_empty() && !config.smtp_password.is_empty() {
            let credentials = Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            );
            transport_builder = transport_builder.credentials(credentials);
        }

        let transport = transport_builder.build();

        info!("SMTP mailer initialized successfully");
        Ok(Self { config, transport })
    }

    /// Build a lettre Message from an OutgoingEmail
    fn build_message(&self, email: OutgoingEmail) -> Result<Message, EmailError> {
        let from_mailbox: Mailbox =
            format!("{} <{}>", self.config.from_name, self.config.from_email)
                .parse()
                .map_err(|e| EmailError::AddressError(format!("Invalid from address: {}", e)))?;

        let to_mailbox: Mailbox = email
            .to
            .parse()
            .map_err(|e| EmailError::AddressError(format!("Invalid to address: {}", e)))?;

        let mut message_builder = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(&email.subject);

        if let Some(ref reply_to) = email.reply_to {
            let reply_mailbox: Mailbox = reply_to
                .parse()
                .map_err(|e| EmailError::AddressError(format!("Invalid reply-to address: {}", e)))?;
            message_builder = message_builder.reply_to(reply_mailbox);
        }

        let html_part = SinglePart::builder()
            .header(ContentType::TEXT_HTML)
            .body(email.html_body);

        if email.attachments.is_empty() {
            return message_builder
                .singlepart(html_part)
                .map_err(|e| EmailError::MessageError(format!("Failed to build message: {}", e)));
        }

        let mut multipart = MultiPart::mixed().singlepart(html_part);
        for attachment in email.attachments {
            let content_type = match attachment.content_type.parse::<ContentType>() {
                Ok(ct) => ct,
                Err(_) => ContentType::parse("application/octet-stream").map_err(|e| {
                    EmailError::MessageError(format!("Invalid attachment content type: {}", e))
                })?,
            };
            multipart = multipart.singlepart(
                Attachment::new(attachment.filename)
                    .body(Body::new(attachment.bytes), content_type),
            );
        }

        message_builder
            .multipart(multipart)
            .map_err(|e| EmailError::MessageError(format!("Failed to build multipart message: {}", e)))
    }

    /// Validate email address format
    fn validate_email_address(&self, email: &str) -> Result<(), EmailError> {
        if email.is_empty() {
            return Err(EmailError::AddressError(
                "Email address cannot be empty".to_string(),
            ));
        }

        let parts: Vec<&str> = email.split('@').collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(EmailError::AddressError("Invalid email format".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, email), fields(to = %email.to, subject = %email.subject))]
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        info!("Sending email to: {}", email.to);

        self.validate_email_address(&email.to)?;

        let message = self.build_message(email)?;

        self.transport.send(message).await.map_err(|e| {
            error!("Failed to send email: {}", e);
            EmailError::SmtpError(format!("Failed to send email: {}", e))
        })?;

        info!("Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Transport construction needs a Tokio runtime.
    fn mailer() -> SmtpMailer {
        SmtpMailer::new(EmailConfig::from_test_env()).expect("test mailer")
    }

    #[tokio::test]
    async fn build_plain_html_message() {
        let email = OutgoingEmail::new("dest@example.com", "Sujet", "<p>Bonjour</p>".to_string());
        assert!(mailer().build_message(email).is_ok());
    }

    #[tokio::test]
    async fn build_message_with_reply_to_and_attachment() {
        let email = OutgoingEmail::new("dest@example.com", "Sujet", "<p>Bonjour</p>".to_string())
            .with_reply_to("owner@example.com")
            .with_attachments(vec![EmailAttachment {
                filename: "photo.jpg".to_string(),
                content_type: "image/jpeg".to_string(),
                bytes: vec![0xFF, 0xD8, 0xFF],
            }]);
        assert!(mailer().build_message(email).is_ok());
    }

    #[tokio::test]
    async fn rejects_invalid_recipient() {
        let m = mailer();
        assert!(m.validate_email_address("not-an-address").is_err());
        assert!(m.validate_email_address("a@b").is_ok());
    }
}
