//! Tier resolution and capability gating
//!
//! The subscription system itself (billing, renewal) is an external
//! collaborator reached through [`EntitlementSource`]; this module only maps
//! an account tier onto the capability set the core enforces.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{BeaconError, Result};

/// Account tier as reported by the subscription system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Premium,
    Lifetime,
}

impl Tier {
    /// Whether this tier unlocks the premium feature set
    pub fn has_premium_features(&self) -> bool {
        matches!(self, Tier::Premium | Tier::Lifetime)
    }
}

/// Capability set derived from a tier
///
/// Never persisted by the core; recomputed on every resolve so a tier change
/// takes effect immediately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub tier: Tier,

    /// Maximum trusted contacts included in an alert fan-out (None = unbounded)
    pub max_trusted_contacts: Option<usize>,

    /// Video capture allowed (audio is always allowed)
    pub video_allowed: bool,

    /// Recordings must be encrypted before upload
    pub encryption_required: bool,

    /// Recordings may be uploaded to cloud backends
    pub cloud_backup_allowed: bool,
}

impl Entitlement {
    /// Derive the capability set for a tier
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Free => Self {
                tier,
                max_trusted_contacts: Some(1),
                video_allowed: false,
                encryption_required: false,
                cloud_backup_allowed: false,
            },
            Tier::Premium | Tier::Lifetime => Self {
                tier,
                max_trusted_contacts: None,
                video_allowed: true,
                encryption_required: true,
                cloud_backup_allowed: true,
            },
        }
    }

    /// Clamp a contact count to this entitlement's fan-out limit
    pub fn contact_limit(&self, available: usize) -> usize {
        match self.max_trusted_contacts {
            Some(max) => available.min(max),
            None => available,
        }
    }
}

/// External account/subscription lookup
///
/// Returns `None` when there is no resolvable user context (signed out,
/// deleted account). The core treats the source as read-only.
#[async_trait]
pub trait EntitlementSource: Send + Sync {
    async fn tier_for(&self, user_id: &str) -> Option<Tier>;
}

/// Resolves a user to their capability set
///
/// Pure lookup with no side effects; calling twice without a tier change
/// yields identical results.
#[derive(Clone)]
pub struct EntitlementGate {
    source: Arc<dyn EntitlementSource>,
}

impl EntitlementGate {
    pub fn new(source: Arc<dyn EntitlementSource>) -> Self {
        Self { source }
    }

    /// Resolve a user's entitlement, failing when no user context exists
    pub async fn resolve(&self, user_id: &str) -> Result<Entitlement> {
        match self.source.tier_for(user_id).await {
            Some(tier) => Ok(Entitlement::for_tier(tier)),
            None => Err(BeaconError::NotAuthenticated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FixedTiers(HashMap<String, Tier>);

    #[async_trait]
    impl EntitlementSource for FixedTiers {
        async fn tier_for(&self, user_id: &str) -> Option<Tier> {
            self.0.get(user_id).copied()
        }
    }

    fn gate() -> EntitlementGate {
        let mut tiers = HashMap::new();
        tiers.insert("u-free".to_string(), Tier::Free);
        tiers.insert("u-premium".to_string(), Tier::Premium);
        tiers.insert("u-lifetime".to_string(), Tier::Lifetime);
        EntitlementGate::new(Arc::new(FixedTiers(tiers)))
    }

    #[tokio::test]
    async fn test_free_tier_capabilities() {
        let ent = gate().resolve("u-free").await.unwrap();
        assert_eq!(ent.tier, Tier::Free);
        assert_eq!(ent.max_trusted_contacts, Some(1));
        assert!(!ent.video_allowed);
        assert!(!ent.encryption_required);
        assert!(!ent.cloud_backup_allowed);
    }

    #[tokio::test]
    async fn test_premium_tier_capabilities() {
        for user in ["u-premium", "u-lifetime"] {
            let ent = gate().resolve(user).await.unwrap();
            assert_eq!(ent.max_trusted_contacts, None);
            assert!(ent.video_allowed);
            assert!(ent.encryption_required);
            assert!(ent.cloud_backup_allowed);
        }
    }

    #[tokio::test]
    async fn test_unknown_user_not_authenticated() {
        let err = gate().resolve("nobody").await.unwrap_err();
        assert!(matches!(err, BeaconError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let gate = gate();
        let first = gate.resolve("u-premium").await.unwrap();
        let second = gate.resolve("u-premium").await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_contact_limit() {
        let free = Entitlement::for_tier(Tier::Free);
        assert_eq!(free.contact_limit(3), 1);
        assert_eq!(free.contact_limit(0), 0);

        let premium = Entitlement::for_tier(Tier::Premium);
        assert_eq!(premium.contact_limit(3), 3);
    }

    #[test]
    fn test_premium_feature_flag() {
        assert!(!Tier::Free.has_premium_features());
        assert!(Tier::Premium.has_premium_features());
        assert!(Tier::Lifetime.has_premium_features());
    }
}
