//! Emergency alert records and dispatch
//!
//! An [`Alert`] is born `Pending` and durably persisted before any delivery
//! attempt, fans out concurrently over the user's trusted contacts, and ends
//! in exactly one terminal status derived from the per-contact outcomes.

pub mod dispatcher;
pub mod message;
pub mod orchestrator;

pub use dispatcher::{ChannelError, DeliveryChannel, NotificationDispatcher};
pub use message::AlertMessage;
pub use orchestrator::AlertOrchestrator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

use crate::location::Location;

/// One delivery mechanism for reaching a contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Sms,
    Email,
    Push,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Sms => write!(f, "sms"),
            ChannelKind::Email => write!(f, "email"),
            ChannelKind::Push => write!(f, "push"),
        }
    }
}

/// Terminal result of one contact's delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

/// One immutable record per contact per alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub contact_id: Ulid,
    pub contact_name: String,

    /// Channel that succeeded (None when every attempt failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_used: Option<ChannelKind>,

    pub status: DeliveryStatus,

    /// Channels actually attempted, in order
    pub attempted_channels: Vec<ChannelKind>,

    /// Last error text when the contact could not be reached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl DeliveryOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == DeliveryStatus::Sent
    }
}

/// Lifecycle status of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// Persisted, dispatch not yet complete
    Pending,
    /// Every contact was reached
    Sent,
    /// At least one contact was reached
    Partial,
    /// No contact was reached
    Failed,
}

impl AlertStatus {
    /// Derive the terminal status from completed outcomes
    ///
    /// An empty outcome set means nobody was reached.
    pub fn from_outcomes(outcomes: &[DeliveryOutcome]) -> Self {
        let sent = outcomes.iter().filter(|o| o.succeeded()).count();
        if outcomes.is_empty() || sent == 0 {
            AlertStatus::Failed
        } else if sent == outcomes.len() {
            AlertStatus::Sent
        } else {
            AlertStatus::Partial
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AlertStatus::Pending)
    }
}

/// A triggered emergency alert and its audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Ulid,
    pub user_id: String,
    pub triggered_at: DateTime<Utc>,
    pub location: Location,
    pub message: String,
    pub outcomes: Vec<DeliveryOutcome>,
    pub status: AlertStatus,
}

impl Alert {
    /// Create the pending record persisted before any dispatch attempt
    pub fn pending(user_id: impl Into<String>, location: Location, message: impl Into<String>) -> Self {
        Self {
            id: Ulid::new(),
            user_id: user_id.into(),
            triggered_at: Utc::now(),
            location,
            message: message.into(),
            outcomes: Vec::new(),
            status: AlertStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: DeliveryStatus) -> DeliveryOutcome {
        DeliveryOutcome {
            contact_id: Ulid::new(),
            contact_name: "A".to_string(),
            channel_used: (status == DeliveryStatus::Sent).then_some(ChannelKind::Sms),
            status,
            attempted_channels: vec![ChannelKind::Sms],
            error: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_status_all_sent() {
        let outcomes = vec![outcome(DeliveryStatus::Sent), outcome(DeliveryStatus::Sent)];
        assert_eq!(AlertStatus::from_outcomes(&outcomes), AlertStatus::Sent);
    }

    #[test]
    fn test_status_partial() {
        let outcomes = vec![outcome(DeliveryStatus::Sent), outcome(DeliveryStatus::Failed)];
        assert_eq!(AlertStatus::from_outcomes(&outcomes), AlertStatus::Partial);
    }

    #[test]
    fn test_status_all_failed() {
        let outcomes = vec![outcome(DeliveryStatus::Failed)];
        assert_eq!(AlertStatus::from_outcomes(&outcomes), AlertStatus::Failed);
    }

    #[test]
    fn test_status_no_outcomes_is_failed() {
        assert_eq!(AlertStatus::from_outcomes(&[]), AlertStatus::Failed);
    }

    #[test]
    fn test_pending_alert_shape() {
        let alert = Alert::pending(
            "u1",
            Location::Unavailable {
                reason: "denied".to_string(),
                captured_at: Utc::now(),
            },
            "help",
        );
        assert_eq!(alert.status, AlertStatus::Pending);
        assert!(alert.outcomes.is_empty());
        assert!(!alert.status.is_terminal());
    }

    #[test]
    fn test_channel_kind_serde() {
        assert_eq!(serde_json::to_string(&ChannelKind::Sms).unwrap(), "\"sms\"");
        assert_eq!(ChannelKind::Push.to_string(), "push");
    }
}
