//! Alert trigger orchestration
//!
//! Durability first: the pending alert is persisted before any delivery
//! attempt, so a crash mid-fan-out still leaves evidence the user called for
//! help. Dispatches run concurrently, each bounded by the fan-out deadline; a
//! contact whose chain has not finished by the deadline is recorded as timed
//! out, never awaited indefinitely.

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{info, warn};

use super::dispatcher::NotificationDispatcher;
use super::message::AlertMessage;
use super::{Alert, AlertStatus, DeliveryOutcome, DeliveryStatus};
use crate::config::CoreConfig;
use crate::contact::Contact;
use crate::entitlement::EntitlementGate;
use crate::error::Result;
use crate::location::LocationResolver;
use crate::persist::PersistenceGateway;

/// Fans one trigger out over the user's trusted contacts
#[derive(Clone)]
pub struct AlertOrchestrator {
    gate: EntitlementGate,
    location: LocationResolver,
    dispatcher: NotificationDispatcher,
    store: Arc<dyn PersistenceGateway>,
    config: CoreConfig,
}

impl AlertOrchestrator {
    pub fn new(
        gate: EntitlementGate,
        location: LocationResolver,
        dispatcher: NotificationDispatcher,
        store: Arc<dyn PersistenceGateway>,
        config: CoreConfig,
    ) -> Self {
        Self {
            gate,
            location,
            dispatcher,
            store,
            config,
        }
    }

    /// Trigger an emergency alert and dispatch it to every trusted contact
    ///
    /// Location failure never aborts the alert; the pending write failing
    /// does, because an unpersisted alert could be silently lost.
    pub async fn trigger(&self, user_id: &str, message: &str) -> Result<Alert> {
        let entitlement = self.gate.resolve(user_id).await?;

        let location = self.location.resolve().await;
        if !location.is_fix() {
            warn!(user = user_id, "alert proceeding without location fix");
        }

        let contacts = self.store.contacts_for_user(user_id).await?;
        let limit = entitlement.contact_limit(contacts.len());
        let dispatch_set: Vec<Contact> = contacts.into_iter().take(limit).collect();

        let mut alert = Alert::pending(user_id, location, message);
        self.store.create_alert(&alert).await?;
        info!(alert = %alert.id, contacts = dispatch_set.len(), "alert persisted, dispatching");

        let payload = AlertMessage::new(
            alert.id,
            user_id,
            message,
            alert.location.clone(),
            alert.triggered_at,
        );

        let deadline = self.config.fanout_deadline();
        let order = self.config.channel_order.clone();
        let dispatches = dispatch_set.iter().map(|contact| {
            let payload = &payload;
            let order = &order;
            async move {
                match timeout(deadline, self.dispatcher.deliver(contact, payload, order)).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(contact = %contact.name, "dispatch abandoned at fan-out deadline");
                        DeliveryOutcome {
                            contact_id: contact.id,
                            contact_name: contact.name.clone(),
                            channel_used: None,
                            status: DeliveryStatus::Failed,
                            attempted_channels: Vec::new(),
                            error: Some("timeout".to_string()),
                            timestamp: Utc::now(),
                        }
                    }
                }
            }
        });

        alert.outcomes = join_all(dispatches).await;
        alert.status = AlertStatus::from_outcomes(&alert.outcomes);

        self.store.finalize_alert(&alert).await?;
        info!(alert = %alert.id, status = ?alert.status, "alert finalized");
        Ok(alert)
    }

    /// Recent alert history for a user, newest first
    pub async fn alerts_for_user(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Alert>> {
        Ok(self.store.alerts_for_user(user_id, limit, offset).await?)
    }
}
