//! Record types held by the two storage regions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An enrollment attempt awaiting its one-time code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRegistration {
    /// Normalized phone number (region key)
    pub phone: String,

    /// Claimed identity public key, base64 exactly as received
    pub identity_key: String,

    /// Six-digit one-time code
    pub code: u32,

    /// When the code was issued
    pub created_at: DateTime<Utc>,

    /// After this instant the record is treated as absent
    pub expires_at: DateTime<Utc>,
}

impl PendingRegistration {
    /// Create a pending record issued now that lives for `ttl`.
    pub fn new(phone: impl Into<String>, identity_key: impl Into<String>, code: u32, ttl: Duration) -> Self {
        let created_at = Utc::now();
        Self {
            phone: phone.into(),
            identity_key: identity_key.into(),
            code,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    /// Whether the record is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether the record is past its expiry.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// A durable identity bound to a verified phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedIdentity {
    pub phone: String,

    /// Copied from the pending record at verification time
    pub identity_key: String,

    pub signed_pre_key: String,

    /// Identity key's signature over the signed prekey
    pub signature: String,

    /// One-time prekeys, in the order supplied
    pub one_time_keys: Vec<String>,

    pub created_at: DateTime<Utc>,
}

/// Region identifiers and connectivity hint for a store backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Identifier of the pending-registration region
    pub pending_region: String,

    /// Identifier of the verified-identity region
    pub identity_region: String,

    /// Locality hint (e.g. a deployment region), reported in logs
    pub locality: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            pending_region: "registration-pending".into(),
            identity_region: "identity".into(),
            locality: None,
        }
    }
}
