//! Best-effort location acquisition with a hard upper bound
//!
//! Location is never allowed to block an alert: the resolver always returns
//! within its configured budget, and every failure mode (timeout, permission
//! denial, device error) is folded into [`Location::Unavailable`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

/// A resolved position or an explicit failure, never partially populated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Location {
    Fix {
        latitude: f64,
        longitude: f64,
        accuracy_meters: f64,
        captured_at: DateTime<Utc>,
    },
    Unavailable {
        reason: String,
        captured_at: DateTime<Utc>,
    },
}

impl Location {
    pub fn is_fix(&self) -> bool {
        matches!(self, Location::Fix { .. })
    }

    /// Shareable map link for a fix
    pub fn maps_url(&self) -> Option<String> {
        match self {
            Location::Fix {
                latitude,
                longitude,
                ..
            } => Some(format!(
                "https://maps.google.com/?q={},{}",
                latitude, longitude
            )),
            Location::Unavailable { .. } => None,
        }
    }

    fn unavailable(reason: impl Into<String>) -> Self {
        Location::Unavailable {
            reason: reason.into(),
            captured_at: Utc::now(),
        }
    }
}

/// A raw position from the underlying device API
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: f64,
}

/// Failure modes of the underlying positioning capability
#[derive(Debug, Error)]
pub enum PositionError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("positioning not supported on this device")]
    Unsupported,

    #[error("position unavailable: {0}")]
    Unavailable(String),
}

/// Device positioning capability, injected so tests can script outcomes
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<PositionFix, PositionError>;
}

/// Bounds a [`LocationProvider`] with a wall-clock budget
#[derive(Clone)]
pub struct LocationResolver {
    provider: Arc<dyn LocationProvider>,
    budget: Duration,
}

impl LocationResolver {
    pub fn new(provider: Arc<dyn LocationProvider>, budget: Duration) -> Self {
        Self { provider, budget }
    }

    /// Resolve the current location within the budget
    ///
    /// Always returns a [`Location`]; the failure variant carries the reason.
    pub async fn resolve(&self) -> Location {
        match timeout(self.budget, self.provider.current_position()).await {
            Ok(Ok(fix)) => Location::Fix {
                latitude: fix.latitude,
                longitude: fix.longitude,
                accuracy_meters: fix.accuracy_meters,
                captured_at: Utc::now(),
            },
            Ok(Err(e)) => {
                debug!(error = %e, "location provider failed");
                Location::unavailable(e.to_string())
            }
            Err(_) => {
                debug!(budget_ms = self.budget.as_millis() as u64, "location timed out");
                Location::unavailable(format!(
                    "location timed out after {} ms",
                    self.budget.as_millis()
                ))
            }
        }
    }
}
