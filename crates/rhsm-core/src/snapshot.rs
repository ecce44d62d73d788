//! Subscription state of the source system

use serde::{Deserialize, Serialize};

/// Consolidated snapshot of subscription-manager state.
///
/// `release` is an empty string when no release is pinned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSnapshot {
    /// SKUs of the attached subscriptions
    pub attached_skus: Vec<String>,
    /// Repo ids available through the RHSM repo file
    pub available_repos: Vec<String>,
    /// Repo ids enabled through subscription-manager
    pub enabled_repos: Vec<String>,
    /// Pinned release, empty when unset
    pub release: String,
    /// Paths of installed product certificates
    pub existing_product_certificates: Vec<String>,
}

impl SubscriptionSnapshot {
    /// Whether a release is pinned
    pub fn has_release(&self) -> bool {
        !self.release.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_release_is_empty_not_null() {
        let snapshot = SubscriptionSnapshot::default();
        assert!(!snapshot.has_release());

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["release"], serde_json::json!(""));
    }
}
