//! WhatsApp alerts via the Twilio Messages API.
//!
//! This module provides:
//! - [`WhatsAppClient`] for sending a message to a WhatsApp number
//! - [`WhatsAppNotifier`], which delivers outbound payment events to the
//!   configured operations number

mod client;
mod error;

use async_trait::async_trait;

use crate::services::notifications::{Notifier, NotifyError, OutboundEvent};

pub use client::{WhatsAppClient, whatsapp_address};
pub use error::WhatsAppError;

/// Notifier that sends every event to one WhatsApp recipient.
#[derive(Debug, Clone)]
pub struct WhatsAppNotifier {
    client: WhatsAppClient,
    recipient: String,
}

impl WhatsAppNotifier {
    #[must_use]
    pub const fn new(client: WhatsAppClient, recipient: String) -> Self {
        Self { client, recipient }
    }
}

#[async_trait]
impl Notifier for WhatsAppNotifier {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    async fn notify(&self, event: &OutboundEvent) -> Result<(), NotifyError> {
        self.client
            .send(&self.recipient, &event.message())
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::Delivery(e.to_string()))
    }
}
