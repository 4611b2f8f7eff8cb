//! Amazon SES delivery.
//!
//! Sends the lettre-composed message as a raw MIME payload so attachments
//! and the alternative parts survive unchanged.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sesv2::Client;
use aws_sdk_sesv2::error::DisplayErrorContext;
use aws_sdk_sesv2::primitives::Blob;
use aws_sdk_sesv2::types::{Destination, EmailContent, RawMessage};
use lettre::Message;
use tracing::info;

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::services::notifier::{Notifier, recipients};

/// SES v2 `SendEmail` delivery.
pub struct SesNotifier {
    client: Client,
    sender: String,
    recipients: Vec<String>,
}

impl SesNotifier {
    pub fn new(client: Client, sender: impl Into<String>, recipients: Vec<String>) -> Self {
        Self {
            client,
            sender: sender.into(),
            recipients,
        }
    }

    /// SES is only provisioned outside local emulation mode.
    pub async fn from_config(config: &Config) -> Result<Self> {
        if config.storage.use_localstack {
            return Err(AppError::config(
                "SES delivery is unavailable in local emulation mode",
            ));
        }

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.storage.region.clone()))
            .load()
            .await;

        Ok(Self::new(
            Client::new(&sdk_config),
            config.email.sender.clone(),
            recipients(&config.email),
        ))
    }
}

#[async_trait]
impl Notifier for SesNotifier {
    async fn send(&self, message: &Message) -> Result<()> {
        let raw = RawMessage::builder()
            .data(Blob::new(message.formatted()))
            .build()
            .map_err(AppError::notify)?;

        let output = self
            .client
            .send_email()
            .from_email_address(&self.sender)
            .destination(
                Destination::builder()
                    .set_to_addresses(Some(self.recipients.clone()))
                    .build(),
            )
            .content(EmailContent::builder().raw(raw).build())
            .send()
            .await
            .map_err(|e| AppError::notify(DisplayErrorContext(e)))?;

        info!(message_id = ?output.message_id(), "Email accepted by SES");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ses"
    }
}
