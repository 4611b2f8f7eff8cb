// src/services/notifier.rs

//! Email notification for matched bulletins.
//!
//! The message is always composed with lettre; the transport decides whether
//! it leaves through SMTP, through SES (as a raw MIME message), or only
//! through the log.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::error::{AppError, Result};
use crate::models::{BulletinUpdate, Config, EmailConfig, EmailTransport};

/// A document attached to the notification.
#[derive(Debug, Clone)]
pub struct PdfAttachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Delivers composed notification messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &Message) -> Result<()>;

    /// Transport name for logs.
    fn name(&self) -> &'static str;
}

/// Build the notifier selected by `email.transport`.
pub async fn notifier_from_config(config: &Config) -> Result<Box<dyn Notifier>> {
    match config.email.transport {
        EmailTransport::Smtp => Ok(Box::new(SmtpNotifier::new(&config.email)?)),
        EmailTransport::Log => Ok(Box::new(LogNotifier)),
        #[cfg(feature = "ses")]
        EmailTransport::Ses => Ok(Box::new(
            crate::services::ses::SesNotifier::from_config(config).await?,
        )),
        #[cfg(not(feature = "ses"))]
        EmailTransport::Ses => Err(AppError::config(
            "email.transport 'ses' requires the `ses` feature",
        )),
    }
}

/// Plain text body listing every update.
pub fn render_text(updates: &[BulletinUpdate]) -> String {
    let mut body =
        String::from("Se encontraron actualizaciones en los boletines técnicos del SAT:\n\n");
    for update in updates {
        body.push_str(&format!(
            "- {}: {}\n  URL: {}\n  Procesado: {}\n\n",
            update.pdf,
            update.keywords.join(", "),
            update.url,
            update.processed_at.to_rfc3339()
        ));
    }
    body
}

/// HTML body listing every update.
pub fn render_html(updates: &[BulletinUpdate]) -> String {
    let mut body = String::from(
        "<html>\n<body>\n<h2>Actualizaciones en Boletines Técnicos del SAT</h2>\n\
         <p>Se encontraron las siguientes actualizaciones:</p>\n<ul>\n",
    );
    for update in updates {
        body.push_str(&format!(
            "<li><strong>{}</strong><br>Palabras clave: {}<br>\
             <a href=\"{}\">Ver documento</a><br>Procesado: {}</li>\n",
            escape_html(&update.pdf),
            escape_html(&update.keywords.join(", ")),
            escape_html(&update.url),
            update.processed_at.to_rfc3339()
        ));
    }
    body.push_str("</ul>\n</body>\n</html>\n");
    body
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn parse_mailbox(address: &str, field: &str) -> Result<Mailbox> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| AppError::notify(format!("invalid {field} address '{address}': {e}")))
}

/// Recipients, allowing a comma-separated list.
pub fn recipients(config: &EmailConfig) -> Vec<String> {
    config
        .recipient
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

/// Compose the notification email.
pub fn compose(
    config: &EmailConfig,
    updates: &[BulletinUpdate],
    attachments: &[PdfAttachment],
) -> Result<Message> {
    let mut builder = Message::builder()
        .from(parse_mailbox(&config.sender, "sender")?)
        .subject(&config.subject);

    let to = recipients(config);
    if to.is_empty() {
        return Err(AppError::notify("no email recipient configured"));
    }
    for recipient in &to {
        builder = builder.to(parse_mailbox(recipient, "recipient")?);
    }

    let alternative = MultiPart::alternative_plain_html(render_text(updates), render_html(updates));

    let message = if attachments.is_empty() {
        builder.multipart(alternative)
    } else {
        let pdf = ContentType::parse("application/pdf").map_err(AppError::notify)?;
        let mut mixed = MultiPart::mixed().multipart(alternative);
        for attachment in attachments {
            mixed = mixed.singlepart(
                Attachment::new(attachment.file_name.clone())
                    .body(attachment.bytes.clone(), pdf.clone()),
            );
        }
        builder.multipart(mixed)
    };

    message.map_err(AppError::notify)
}

/// Authenticated SMTP delivery with STARTTLS.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpNotifier {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(AppError::notify)?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.sender.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self { transport })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, message: &Message) -> Result<()> {
        self.transport
            .send(message.clone())
            .await
            .map_err(AppError::notify)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

/// Logs the message instead of delivering it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &Message) -> Result<()> {
        let formatted = message.formatted();
        info!(
            bytes = formatted.len(),
            "Dry run, email not sent:\n{}",
            String::from_utf8_lossy(&formatted)
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn email_config() -> EmailConfig {
        EmailConfig {
            sender: "monitor@example.com".to_string(),
            recipient: "team@example.com, audit@example.com".to_string(),
            password: "secret".to_string(),
            ..EmailConfig::default()
        }
    }

    fn updates() -> Vec<BulletinUpdate> {
        vec![BulletinUpdate {
            pdf: "BT_01_2025.pdf".to_string(),
            keywords: vec!["CFDI 4.0".to_string(), "Anexo 20".to_string()],
            url: "https://example.com/BT_01_2025.pdf?a=1&b=2".to_string(),
            processed_at: Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap(),
        }]
    }

    #[test]
    fn test_render_text() {
        let text = render_text(&updates());
        assert!(text.contains("- BT_01_2025.pdf: CFDI 4.0, Anexo 20"));
        assert!(text.contains("URL: https://example.com/BT_01_2025.pdf?a=1&b=2"));
        assert!(text.contains("Procesado: 2025-01-15T12:00:00+00:00"));
    }

    #[test]
    fn test_render_html_escapes() {
        let html = render_html(&updates());
        assert!(html.contains("<strong>BT_01_2025.pdf</strong>"));
        assert!(html.contains("href=\"https://example.com/BT_01_2025.pdf?a=1&amp;b=2\""));
        assert!(!html.contains("a=1&b=2"));
    }

    #[test]
    fn test_recipients_split() {
        assert_eq!(
            recipients(&email_config()),
            vec!["team@example.com", "audit@example.com"]
        );
    }

    #[test]
    fn test_compose_alternative_message() {
        let message = compose(&email_config(), &updates(), &[]).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).to_string();

        assert!(raw.contains("monitor@example.com"));
        assert!(raw.contains("team@example.com"));
        assert!(raw.contains("audit@example.com"));
        assert!(raw.contains("multipart/alternative"));
        assert!(!raw.contains("multipart/mixed"));
    }

    #[test]
    fn test_compose_with_attachment() {
        let attachment = PdfAttachment {
            file_name: "BT_01_2025.pdf".to_string(),
            bytes: b"%PDF-1.4 fake".to_vec(),
        };
        let message = compose(&email_config(), &updates(), &[attachment]).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).to_string();

        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("application/pdf"));
        assert!(raw.contains("BT_01_2025.pdf"));
    }

    #[test]
    fn test_compose_rejects_bad_sender() {
        let config = EmailConfig {
            sender: "not-an-address".to_string(),
            ..email_config()
        };
        assert!(matches!(
            compose(&config, &updates(), &[]),
            Err(AppError::Notify(_))
        ));
    }

    #[test]
    fn test_compose_requires_recipient() {
        let config = EmailConfig {
            recipient: " , ".to_string(),
            ..email_config()
        };
        assert!(compose(&config, &updates(), &[]).is_err());
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_message() {
        let message = compose(&email_config(), &updates(), &[]).unwrap();
        assert!(LogNotifier.send(&message).await.is_ok());
    }

    #[tokio::test]
    async fn test_notifier_from_config_log() {
        let mut config = Config::default();
        config.email = email_config();
        config.email.transport = EmailTransport::Log;
        let notifier = notifier_from_config(&config).await.unwrap();
        assert_eq!(notifier.name(), "log");
    }
}
