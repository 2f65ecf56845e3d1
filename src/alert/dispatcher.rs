//! Per-contact delivery across an ordered chain of channels
//!
//! Channels are strategy objects behind one trait; the dispatcher walks the
//! configured order, skips channels the contact has no address for, bounds
//! every attempt with its own timeout, and stops at the first success. A
//! failing channel is recorded and the chain advances; only exhaustion of
//! the whole chain marks the contact failed.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::message::AlertMessage;
use super::{ChannelKind, DeliveryOutcome, DeliveryStatus};
use crate::contact::Contact;

/// Errors reported by a channel's gateway
///
/// Never propagated past the dispatcher; they end up as outcome error text.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The outbound gateway rejected or failed the send
    #[error("gateway error: {0}")]
    Gateway(String),

    /// The contact has no address for this channel
    #[error("contact has no {0} address")]
    MissingAddress(ChannelKind),
}

/// One delivery mechanism conforming to a common strategy interface
///
/// Implementations wrap an outbound gateway (SMS carrier, mail service, push
/// service); the core owns ordering and failover, never the transport.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Whether the contact carries the address this channel requires
    fn can_reach(&self, contact: &Contact) -> bool;

    /// Make exactly one outbound delivery attempt
    async fn send(&self, contact: &Contact, message: &AlertMessage) -> Result<(), ChannelError>;
}

/// Walks an ordered channel chain for one contact
#[derive(Clone)]
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn DeliveryChannel>>,
    attempt_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(channels: Vec<Arc<dyn DeliveryChannel>>, attempt_timeout: Duration) -> Self {
        Self {
            channels,
            attempt_timeout,
        }
    }

    fn channel(&self, kind: ChannelKind) -> Option<&Arc<dyn DeliveryChannel>> {
        self.channels.iter().find(|c| c.kind() == kind)
    }

    /// Attempt delivery to one contact across the given channel order
    ///
    /// Each usable channel is attempted at most once with its own timeout.
    /// Always returns an outcome; delivery failure is data, not an error.
    pub async fn deliver(
        &self,
        contact: &Contact,
        message: &AlertMessage,
        order: &[ChannelKind],
    ) -> DeliveryOutcome {
        let mut attempted = Vec::new();
        let mut last_error: Option<String> = None;

        for &kind in order {
            let Some(channel) = self.channel(kind) else {
                continue;
            };
            if !channel.can_reach(contact) {
                continue;
            }

            attempted.push(kind);
            debug!(contact = %contact.name, channel = %kind, "attempting delivery");

            match timeout(self.attempt_timeout, channel.send(contact, message)).await {
                Ok(Ok(())) => {
                    debug!(contact = %contact.name, channel = %kind, "delivered");
                    return DeliveryOutcome {
                        contact_id: contact.id,
                        contact_name: contact.name.clone(),
                        channel_used: Some(kind),
                        status: DeliveryStatus::Sent,
                        attempted_channels: attempted,
                        error: None,
                        timestamp: Utc::now(),
                    };
                }
                Ok(Err(e)) => {
                    warn!(contact = %contact.name, channel = %kind, error = %e, "channel failed");
                    last_error = Some(e.to_string());
                }
                Err(_) => {
                    warn!(contact = %contact.name, channel = %kind, "channel timed out");
                    last_error = Some(format!(
                        "{} timed out after {} ms",
                        kind,
                        self.attempt_timeout.as_millis()
                    ));
                }
            }
        }

        let error = last_error
            .unwrap_or_else(|| "no usable channel for contact".to_string());

        DeliveryOutcome {
            contact_id: contact.id,
            contact_name: contact.name.clone(),
            channel_used: None,
            status: DeliveryStatus::Failed,
            attempted_channels: attempted,
            error: Some(error),
            timestamp: Utc::now(),
        }
    }
}
